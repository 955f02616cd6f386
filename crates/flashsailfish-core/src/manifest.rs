//! Firmware manifest parsing and normalization
//!
//! The manifest is an XML document of the form:
//!
//! ```xml
//! <boards>
//!     <board name="Replicator 2">
//!         <firmware name="7.7" relpath="mighty_two-7.7.hex" description="Sailfish 7.7"
//!                   protocol="stk500v1" speed="57600" arch="atmega1280"/>
//!     </board>
//! </boards>
//! ```
//!
//! Parsing is lenient about content: every attribute is optional at this
//! stage, so a board missing its name still parses. Validation happens in
//! [`normalize`], which drops malformed entries instead of failing the
//! whole document.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::{Board, Catalog, Firmware};

/// Name of the manifest root element
pub const ROOT_ELEMENT: &str = "boards";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed manifest: {0}")]
    Malformed(String),
    #[error("Unexpected manifest root element <{0}>, expected <boards>")]
    UnexpectedRoot(String),
}

/// A `<firmware>` element as it appears in the manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareEntry {
    #[serde(rename = "@name", default)]
    pub name: Option<String>,
    #[serde(rename = "@relpath", default)]
    pub relpath: Option<String>,
    #[serde(rename = "@description", default)]
    pub description: Option<String>,
    #[serde(rename = "@protocol", default)]
    pub protocol: Option<String>,
    #[serde(rename = "@speed", default)]
    pub speed: Option<String>,
    #[serde(rename = "@arch", default)]
    pub arch: Option<String>,
    #[serde(rename = "@manualreset", default)]
    pub manualreset: Option<String>,
}

/// A `<board>` element as it appears in the manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardEntry {
    #[serde(rename = "@name", default)]
    pub name: Option<String>,
    /// Always a list, even when the board has a single `<firmware>` child
    #[serde(default)]
    pub firmware: Vec<FirmwareEntry>,
}

/// The parsed `<boards>` document, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDocument {
    #[serde(default)]
    pub board: Vec<BoardEntry>,
}

impl ManifestDocument {
    /// Parse a manifest from XML text
    pub fn from_xml(xml: &str) -> Result<Self, ParseError> {
        check_document(xml)?;
        quick_xml::de::from_str(xml).map_err(|e| ParseError::Malformed(e.to_string()))
    }
}

fn is_blank(text: &[u8]) -> bool {
    text.iter().all(|b| b.is_ascii_whitespace())
}

/// Walk the whole document: exactly one `<boards>` root, nothing but
/// comments, processing instructions and whitespace around it
fn check_document(xml: &str) -> Result<(), ParseError> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut root_closed = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            ParseError::Malformed(format!(
                "error at position {}: {}",
                reader.error_position(),
                e
            ))
        })?;
        let position = reader.buffer_position();

        match &event {
            Event::Start(_) | Event::Empty(_) if root_closed => {
                return Err(ParseError::Malformed(format!(
                    "second root element at position {}",
                    position
                )));
            }
            Event::Start(e) | Event::Empty(e) if depth == 0 => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name != ROOT_ELEMENT {
                    return Err(ParseError::UnexpectedRoot(name));
                }
                if matches!(event, Event::Start(_)) {
                    depth = 1;
                } else {
                    root_closed = true;
                }
            }
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    root_closed = true;
                }
            }
            Event::Text(text) if depth == 0 && !is_blank(text) => {
                return Err(ParseError::Malformed(format!(
                    "text outside the root element at position {}",
                    position
                )));
            }
            Event::CData(_) | Event::DocType(_) if root_closed => {
                return Err(ParseError::Malformed(format!(
                    "content after the root element at position {}",
                    position
                )));
            }
            Event::Eof if !root_closed => {
                return Err(ParseError::Malformed(if depth == 0 {
                    "document has no root element".to_string()
                } else {
                    "unexpected end of document".to_string()
                }));
            }
            Event::Eof => return Ok(()),
            _ => {}
        }
    }
}

/// What normalization kept, skipped, and overwrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    /// Board entries in the document
    pub boards_total: usize,
    pub boards_valid: usize,
    pub boards_skipped: usize,
    /// Firmware entries under valid boards
    pub firmwares_total: usize,
    pub firmwares_valid: usize,
    pub firmwares_skipped: usize,
    /// Board names that appeared more than once (later entry wins)
    pub duplicate_boards: Vec<String>,
    /// (board, firmware) names that appeared more than once within a board
    pub duplicate_firmwares: Vec<(String, String)>,
}

impl NormalizeReport {
    pub fn has_duplicates(&self) -> bool {
        !self.duplicate_boards.is_empty() || !self.duplicate_firmwares.is_empty()
    }
}

/// Turn a parsed manifest into a catalog
///
/// Boards without a name or without any firmware are skipped, as are
/// firmware entries missing `name`, `relpath` or `description`. Skips are
/// logged and counted but never fail the call. When a name repeats, the
/// later entry replaces the earlier one and the collision is reported.
pub fn normalize(document: &ManifestDocument) -> (Catalog, NormalizeReport) {
    let mut catalog = Catalog::new();
    let mut report = NormalizeReport {
        boards_total: document.board.len(),
        ..Default::default()
    };

    for (index, entry) in document.board.iter().enumerate() {
        let name = match (&entry.name, entry.firmware.is_empty()) {
            (Some(name), false) => name,
            _ => {
                info!(
                    index,
                    name = ?entry.name,
                    firmwares = entry.firmware.len(),
                    "Skipping board"
                );
                report.boards_skipped += 1;
                continue;
            }
        };

        let mut board = Board::new(name.clone(), index);
        for firmware_entry in &entry.firmware {
            report.firmwares_total += 1;
            let Some((firmware_name, firmware)) = to_firmware(firmware_entry) else {
                info!(board = %name, firmware = ?firmware_entry, "Skipping firmware");
                report.firmwares_skipped += 1;
                continue;
            };

            report.firmwares_valid += 1;
            if board.firmwares.insert(firmware_name.clone(), firmware).is_some() {
                warn!(
                    board = %name,
                    firmware = %firmware_name,
                    "Duplicate firmware name in manifest, later entry replaces earlier one"
                );
                report.duplicate_firmwares.push((name.clone(), firmware_name));
            }
        }

        report.boards_valid += 1;
        if let Some(previous) = catalog.insert(board) {
            warn!(
                board = %name,
                previous_idx = previous.index,
                idx = index,
                "Duplicate board name in manifest, later entry replaces earlier one"
            );
            report.duplicate_boards.push(name.clone());
        }
    }

    (catalog, report)
}

fn to_firmware(entry: &FirmwareEntry) -> Option<(String, Firmware)> {
    let name = entry.name.as_ref()?;
    let relpath = entry.relpath.as_ref()?;
    let description = entry.description.as_ref()?;

    let firmware = Firmware {
        relpath: relpath.clone(),
        description: description.clone(),
        protocol: entry.protocol.clone().unwrap_or_default(),
        speed: entry.speed.clone().unwrap_or_default(),
        architecture: entry.arch.clone().unwrap_or_default(),
        manual_reset: entry.manualreset.clone().unwrap_or_default(),
    };
    Some((name.clone(), firmware))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_from(xml: &str) -> (Catalog, NormalizeReport) {
        let document = ManifestDocument::from_xml(xml).unwrap();
        normalize(&document)
    }

    #[test]
    fn test_parse_manifest() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<boards>
    <board name="Replicator 2">
        <firmware name="7.7" relpath="mighty_two-7.7.hex" description="Sailfish 7.7"
                  protocol="stk500v1" speed="57600" arch="atmega1280" manualreset="1"/>
        <firmware name="7.6" relpath="mighty_two-7.6.hex" description="Sailfish 7.6"/>
    </board>
    <board name="Cupcake">
        <firmware name="4.4" relpath="cupcake-4.4.hex" description="Sailfish 4.4"/>
    </board>
</boards>"#;

        let document = ManifestDocument::from_xml(xml).unwrap();
        assert_eq!(document.board.len(), 2);
        assert_eq!(document.board[0].name, Some("Replicator 2".to_string()));
        assert_eq!(document.board[0].firmware.len(), 2);
        assert_eq!(document.board[0].firmware[0].arch, Some("atmega1280".to_string()));
        assert_eq!(document.board[0].firmware[1].arch, None);
        assert_eq!(document.board[1].firmware.len(), 1);
    }

    #[test]
    fn test_normalize_copies_metadata() {
        let (catalog, report) = catalog_from(
            r#"<boards>
    <board name="Replicator 2">
        <firmware name="7.7" relpath="mighty_two-7.7.hex" description="Sailfish 7.7"
                  protocol="stk500v1" speed="57600" arch="atmega1280" manualreset="1"/>
        <firmware name="7.6" relpath="mighty_two-7.6.hex" description="Sailfish 7.6"/>
    </board>
</boards>"#,
        );

        assert_eq!(report.boards_valid, 1);
        let board = catalog.get("Replicator 2").unwrap();
        assert_eq!(board.index, 0);

        let full = board.firmware("7.7").unwrap();
        assert_eq!(full.relpath, "mighty_two-7.7.hex");
        assert_eq!(full.protocol, "stk500v1");
        assert_eq!(full.speed, "57600");
        assert_eq!(full.architecture, "atmega1280");
        assert_eq!(full.manual_reset, "1");

        let bare = board.firmware("7.6").unwrap();
        assert_eq!(bare.description, "Sailfish 7.6");
        assert_eq!(bare.protocol, "");
        assert_eq!(bare.speed, "");
        assert_eq!(bare.architecture, "");
        assert_eq!(bare.manual_reset, "");
    }

    #[test]
    fn test_board_without_name_is_skipped() {
        let (catalog, report) = catalog_from(
            r#"<boards>
    <board name="Board A">
        <firmware name="v1" relpath="a.hex" description="A firmware"/>
    </board>
    <board>
        <firmware name="v1" relpath="b.hex" description="B firmware"/>
    </board>
</boards>"#,
        );

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("Board A").unwrap().index, 0);
        assert_eq!(report.boards_skipped, 1);
    }

    #[test]
    fn test_board_without_firmware_is_skipped() {
        let (catalog, report) = catalog_from(
            r#"<boards>
    <board name="Empty"/>
    <board name="Also Empty"></board>
    <board name="Full">
        <firmware name="v1" relpath="f.hex" description="F"/>
    </board>
</boards>"#,
        );

        assert!(!catalog.contains("Empty"));
        assert!(!catalog.contains("Also Empty"));
        assert_eq!(catalog.get("Full").unwrap().index, 2);
        assert_eq!(report.boards_total, 3);
        assert_eq!(report.boards_valid + report.boards_skipped, report.boards_total);
    }

    #[test]
    fn test_incomplete_firmware_is_skipped() {
        let (catalog, report) = catalog_from(
            r#"<boards>
    <board name="Board">
        <firmware name="good" relpath="good.hex" description="Good"/>
        <firmware relpath="noname.hex" description="No name"/>
        <firmware name="nopath" description="No relpath"/>
        <firmware name="nodesc" relpath="nodesc.hex"/>
    </board>
</boards>"#,
        );

        let board = catalog.get("Board").unwrap();
        assert_eq!(board.firmwares.len(), 1);
        assert!(board.firmware("good").is_some());
        assert_eq!(report.firmwares_total, 4);
        assert_eq!(report.firmwares_valid, 1);
        assert_eq!(report.firmwares_skipped, 3);
    }

    #[test]
    fn test_board_with_only_invalid_firmware_is_kept() {
        let (catalog, _) = catalog_from(
            r#"<boards>
    <board name="Board">
        <firmware name="broken"/>
    </board>
</boards>"#,
        );

        let board = catalog.get("Board").unwrap();
        assert!(board.firmwares.is_empty());
    }

    #[test]
    fn test_single_firmware_matches_list() {
        let (from_xml, _) = catalog_from(
            r#"<boards>
    <board name="Solo">
        <firmware name="v1" relpath="solo.hex" description="Solo firmware"/>
    </board>
</boards>"#,
        );

        let document = ManifestDocument {
            board: vec![BoardEntry {
                name: Some("Solo".to_string()),
                firmware: vec![FirmwareEntry {
                    name: Some("v1".to_string()),
                    relpath: Some("solo.hex".to_string()),
                    description: Some("Solo firmware".to_string()),
                    ..Default::default()
                }],
            }],
        };
        let (from_list, _) = normalize(&document);

        assert_eq!(from_xml, from_list);
    }

    #[test]
    fn test_indices_follow_document_order() {
        let (catalog, report) = catalog_from(
            r#"<boards>
    <board name="Zeta"><firmware name="v" relpath="z.hex" description="z"/></board>
    <board/>
    <board name="Alpha"><firmware name="v" relpath="a.hex" description="a"/></board>
    <board name="Empty"/>
    <board name="Mid"><firmware name="v" relpath="m.hex" description="m"/></board>
</boards>"#,
        );

        assert_eq!(report.boards_total, 5);
        assert_eq!(catalog.get("Zeta").unwrap().index, 0);
        assert_eq!(catalog.get("Alpha").unwrap().index, 2);
        assert_eq!(catalog.get("Mid").unwrap().index, 4);
    }

    #[test]
    fn test_duplicate_names_last_wins_and_reported() {
        let (catalog, report) = catalog_from(
            r#"<boards>
    <board name="Dup">
        <firmware name="v1" relpath="first.hex" description="first"/>
        <firmware name="v1" relpath="second.hex" description="second"/>
    </board>
    <board name="Dup">
        <firmware name="v2" relpath="third.hex" description="third"/>
    </board>
</boards>"#,
        );

        let board = catalog.get("Dup").unwrap();
        assert_eq!(board.index, 1);
        assert!(board.firmware("v1").is_none());
        assert_eq!(board.firmware("v2").unwrap().relpath, "third.hex");

        assert!(report.has_duplicates());
        assert_eq!(report.duplicate_boards, vec!["Dup".to_string()]);
        assert_eq!(
            report.duplicate_firmwares,
            vec![("Dup".to_string(), "v1".to_string())]
        );
        assert_eq!(report.boards_valid, 2);
    }

    #[test]
    fn test_empty_boards_document() {
        let (catalog, report) = catalog_from("<boards/>");
        assert!(catalog.is_empty());
        assert_eq!(report, NormalizeReport::default());
    }

    #[test]
    fn test_unknown_elements_ignored() {
        let (catalog, _) = catalog_from(
            r#"<boards>
    <board name="Board">
        <notes>Ships with bootloader</notes>
        <firmware name="v1" relpath="v1.hex" description="one"/>
    </board>
</boards>"#,
        );

        assert_eq!(catalog.get("Board").unwrap().firmwares.len(), 1);
    }

    #[test]
    fn test_reject_non_xml() {
        let result = ManifestDocument::from_xml("this is not a manifest");
        assert!(matches!(result, Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_reject_wrong_root() {
        let result = ManifestDocument::from_xml("<html><body>Access denied</body></html>");
        assert_eq!(result, Err(ParseError::UnexpectedRoot("html".to_string())));
    }

    #[test]
    fn test_reject_mismatched_tags() {
        let result = ManifestDocument::from_xml(r#"<boards><board name="A"></boards>"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_reject_trailing_content() {
        let result = ManifestDocument::from_xml(
            r#"<boards><board name="A"><firmware name="v1" relpath="a.hex" description="A"/></board></boards>garbage"#,
        );
        assert!(matches!(result, Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_reject_second_root() {
        let result = ManifestDocument::from_xml(
            r#"<!-- c --><boards><board name="A"><firmware name="v1" relpath="a.hex" description="A"/></board></boards><html/>"#,
        );
        assert!(matches!(result, Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_reject_truncated_document() {
        let result = ManifestDocument::from_xml(r#"<boards><board name="A">"#);
        assert!(matches!(result, Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_accept_trailing_comment_and_whitespace() {
        let (catalog, _) = catalog_from(
            "<?xml version=\"1.0\"?>\n<!-- release manifest -->\n<boards>\n    <board name=\"A\"><firmware name=\"v1\" relpath=\"a.hex\" description=\"A\"/></board>\n</boards>\n<!-- generated -->\n\n",
        );
        assert!(catalog.contains("A"));
    }
}
