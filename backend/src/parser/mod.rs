//! CSV decoding and row extraction for emissions imports.
//!
//! Turns uploaded bytes into a header row plus a lazy stream of [`RawRow`]s.
//! No typing or validation of field values happens here.

use encoding_rs::{Encoding, UTF_8};
use std::collections::HashMap;

use crate::error::ImportError;

// =============================================================================
// Header configuration
// =============================================================================

pub const HEADER_COMPANY: &str = "Empresa";
pub const HEADER_YEAR: &str = "Ano";
pub const HEADER_SECTOR: &str = "Setor";
pub const HEADER_ENERGY: &str = "Consumo de Energia (MWh)";
pub const HEADER_EMISSIONS: &str = "Emissões de CO2 (toneladas)";

/// Required header names, in the order missing ones are reported.
pub const REQUIRED_HEADERS: [&str; 5] = [
    HEADER_COMPANY,
    HEADER_YEAR,
    HEADER_SECTOR,
    HEADER_ENERGY,
    HEADER_EMISSIONS,
];

/// One data row as found in the file: header name to raw text.
///
/// Columns absent from a short row are absent from `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based position, the header being row 1.
    pub row_number: usize,
    pub fields: HashMap<String, String>,
}

impl RawRow {
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields.get(header).map(String::as_str)
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode uploaded bytes as text, dropping a leading byte-order mark.
///
/// Without a BOM the content must be valid UTF-8. A UTF-16 BOM selects the
/// matching UTF-16 decoder. Malformed input is a [`ImportError::Decode`].
pub fn decode_content(bytes: &[u8]) -> Result<String, ImportError> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => (encoding, &bytes[bom_len..]),
        None => (UTF_8, bytes),
    };

    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| text.into_owned())
        .ok_or_else(|| {
            ImportError::Decode(format!("file is not valid {} text", encoding.name()))
        })
}

/// Detect the delimiter by counting occurrences in the first non-blank line.
///
/// Ties and header lines without any candidate fall back to a comma.
pub fn detect_delimiter(content: &str) -> u8 {
    let first_line = content
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");

    let separators = [b',', b';', b'\t'];
    let mut best_sep = b',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep as char).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

// =============================================================================
// Document
// =============================================================================

/// A decoded CSV document with its header row already read.
pub struct CsvDocument<'a> {
    headers: Vec<String>,
    delimiter: u8,
    reader: csv::Reader<&'a [u8]>,
}

impl<'a> CsvDocument<'a> {
    /// Read the header row. Fails with [`ImportError::EmptyFile`] when there is none.
    pub fn open(content: &'a str) -> Result<Self, ImportError> {
        let delimiter = detect_delimiter(content);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() {
            return Err(ImportError::EmptyFile);
        }

        Ok(Self {
            headers,
            delimiter,
            reader,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Required headers absent from the file, in [`REQUIRED_HEADERS`] order.
    pub fn missing_headers(&self) -> Vec<String> {
        REQUIRED_HEADERS
            .iter()
            .filter(|required| !self.headers.iter().any(|h| h == *required))
            .map(|h| h.to_string())
            .collect()
    }

    /// Lazily yield data rows in file order. Blank lines are skipped and do
    /// not consume row numbers.
    pub fn into_rows(self) -> impl Iterator<Item = Result<RawRow, ImportError>> + 'a {
        let headers = self.headers;
        self.reader
            .into_records()
            .enumerate()
            .map(move |(idx, record)| {
                let record = record?;
                let fields = headers
                    .iter()
                    .zip(record.iter())
                    .map(|(h, v)| (h.clone(), v.to_string()))
                    .collect();
                Ok(RawRow {
                    row_number: idx + 2,
                    fields,
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_LINE: &str =
        "Empresa,Ano,Setor,Consumo de Energia (MWh),Emissões de CO2 (toneladas)";

    #[test]
    fn test_decode_strips_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(HEADER_LINE.as_bytes());
        let text = decode_content(&bytes).unwrap();
        assert!(text.starts_with("Empresa,"));
    }

    #[test]
    fn test_decode_utf16_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Empresa,Ano".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_content(&bytes).unwrap(), "Empresa,Ano");
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        // "Soci\xe9t\xe9" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let err = decode_content(bytes).unwrap_err();
        assert!(matches!(err, ImportError::Decode(_)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), b',');
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), b';');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), b'\t');
        assert_eq!(detect_delimiter("single"), b',');
        assert_eq!(detect_delimiter("\n\na;b\n"), b';');
    }

    #[test]
    fn test_empty_content_has_no_headers() {
        assert!(matches!(CsvDocument::open(""), Err(ImportError::EmptyFile)));
        assert!(matches!(CsvDocument::open("\n\n"), Err(ImportError::EmptyFile)));
    }

    #[test]
    fn test_missing_headers_in_required_order() {
        let doc = CsvDocument::open("Ano,Empresa\nx,y").unwrap();
        assert_eq!(
            doc.missing_headers(),
            vec![HEADER_SECTOR, HEADER_ENERGY, HEADER_EMISSIONS]
        );
    }

    #[test]
    fn test_rows_numbered_from_two() {
        let content = format!("{HEADER_LINE}\nA,2023,Energy,1,2\n\nB,2024,Retail,3,4\n");
        let doc = CsvDocument::open(&content).unwrap();
        assert!(doc.missing_headers().is_empty());

        let rows: Vec<RawRow> = doc.into_rows().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number, 2);
        assert_eq!(rows[0].get("Empresa"), Some("A"));
        assert_eq!(rows[1].row_number, 3);
        assert_eq!(rows[1].get("Setor"), Some("Retail"));
    }

    #[test]
    fn test_short_row_leaves_fields_absent() {
        let content = format!("{HEADER_LINE}\nA,2023");
        let doc = CsvDocument::open(&content).unwrap();
        let rows: Vec<RawRow> = doc.into_rows().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows[0].get("Ano"), Some("2023"));
        assert_eq!(rows[0].get("Setor"), None);
    }

    #[test]
    fn test_quoted_decimal_comma() {
        let content = format!("{HEADER_LINE}\n\"Acme, Inc\",2023,Energy,\"1000,50\",2");
        let doc = CsvDocument::open(&content).unwrap();
        let rows: Vec<RawRow> = doc.into_rows().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows[0].get("Empresa"), Some("Acme, Inc"));
        assert_eq!(rows[0].get(HEADER_ENERGY), Some("1000,50"));
    }

    #[test]
    fn test_semicolon_file() {
        let content = "Empresa;Ano;Setor;Consumo de Energia (MWh);Emissões de CO2 (toneladas)\n\
                       A;2023;Energy;1000,5;20,25";
        let doc = CsvDocument::open(content).unwrap();
        assert_eq!(doc.delimiter(), b';');
        let rows: Vec<RawRow> = doc.into_rows().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows[0].get(HEADER_EMISSIONS), Some("20,25"));
    }
}
