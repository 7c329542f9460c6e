//! Template assembly: render one [`AnalysisRecord`] plus the diagram
//! image into the SOP `.docx`.
//!
//! ## Determinism
//!
//! The template is fixed: section order, boilerplate text, table shapes,
//! and styling never depend on the record. Only the variable slots
//! (title block, objective, purpose, the Detailed Process Steps body and
//! the embedded diagram) change between documents, and every missing
//! field renders as `"N/A"` rather than failing. The sole failure modes
//! are the output sink and the PNG encoding of the diagram.
//!
//! ## Styles
//!
//! Exactly four named paragraph styles are defined once and applied
//! everywhere; content never overrides them. Sizes are half-points
//! (OOXML `w:sz`).
//!
//! ## Tables
//!
//! Every table goes through [`bordered`] — single-line borders on all
//! four sides and between all cells, no exceptions.

use crate::error::UnitError;
use crate::pipeline::encode;
use crate::record::{AnalysisRecord, Steps, MISSING};
use docx_rs::{
    AbstractNumbering, AlignmentType, BorderType, BreakType, Docx, IndentLevel, Level, LevelJc,
    LevelText, NumberFormat, Numbering, NumberingId, Paragraph, Pic, Run, SpecialIndentType,
    Start, Style, StyleType, Table, TableBorder, TableBorderPosition, TableBorders, TableCell,
    TableRow,
};
use image::DynamicImage;
use std::io::{Cursor, Seek, Write};
use tracing::debug;

// ── Named styles ─────────────────────────────────────────────────────────

const STYLE_TITLE: &str = "SopTitle";
const STYLE_SUBTITLE: &str = "SopSubtitle";
const STYLE_HEADING: &str = "SopHeading1";
const STYLE_SUBHEADING: &str = "SopHeading2";

/// Numbering id for the table-of-contents list.
const NUM_TOC: usize = 1;
/// Numbering id for detail bullets.
const NUM_BULLET: usize = 2;

/// EMU per inch (OOXML drawing unit).
const EMU_PER_INCH: f32 = 914_400.0;

/// The fixed table of contents. Hard-coded by design — it names the
/// template's sections, not the record's content.
const TOC_ITEMS: [&str; 15] = [
    " Overview",
    "   Purpose and Scope",
    "   Definitions",
    "   System of Engagement",
    "   Roles and Responsibilities",
    " Process Narrative",
    "   COPIS",
    "   Process Map/Flowchart",
    " Detailed Process Steps",
    " Process Exceptions Handling",
    " Compliance Control",
    " Escalation Process",
    " Process SLAs",
    " Related Documents",
    " Sign Off",
];

/// Assemble the SOP document into a byte buffer.
pub fn assemble(
    record: &AnalysisRecord,
    diagram: &DynamicImage,
    image_width_inches: f32,
) -> Result<Vec<u8>, UnitError> {
    let mut sink = Cursor::new(Vec::new());
    assemble_into(record, diagram, image_width_inches, &mut sink)?;
    Ok(sink.into_inner())
}

/// Assemble the SOP document into the given sink.
///
/// # Errors
/// [`UnitError::AssemblyFailed`] when the diagram cannot be encoded to
/// PNG or the sink cannot be written. Record content never fails.
pub fn assemble_into<W: Write + Seek>(
    record: &AnalysisRecord,
    diagram: &DynamicImage,
    image_width_inches: f32,
    sink: W,
) -> Result<(), UnitError> {
    // Encode the diagram up front so a bad image fails before any output
    // is produced. The buffer is scoped to this call; nothing is written
    // to disk.
    let png = encode::encode_png(diagram).map_err(|e| UnitError::AssemblyFailed {
        detail: format!("cannot encode diagram as PNG: {e}"),
    })?;

    let mut docx = base_document();

    docx = title_block(docx, record);
    docx = document_history(docx);
    docx = table_of_contents(docx);
    docx = overview(docx, record);
    docx = engagement_and_roles(docx);
    docx = process_narrative(docx, record, &png, diagram, image_width_inches);
    docx = detailed_steps(docx, record);
    docx = closing_sections(docx);

    docx.build().pack(sink).map_err(|e| UnitError::AssemblyFailed {
        detail: format!("cannot write document: {e}"),
    })?;

    debug!("SOP document assembled");
    Ok(())
}

// ── Document scaffolding ─────────────────────────────────────────────────

/// The empty document with its four styles and two numberings defined.
fn base_document() -> Docx {
    Docx::new()
        .add_style(
            Style::new(STYLE_TITLE, StyleType::Paragraph)
                .name("SOP Title")
                .size(52)
                .bold()
                .color("1081F2"),
        )
        .add_style(
            Style::new(STYLE_SUBTITLE, StyleType::Paragraph)
                .name("SOP Subtitle")
                .size(40)
                .bold()
                .color("000000"),
        )
        .add_style(
            Style::new(STYLE_HEADING, StyleType::Paragraph)
                .name("SOP Heading 1")
                .size(28)
                .bold()
                .color("000000"),
        )
        .add_style(
            Style::new(STYLE_SUBHEADING, StyleType::Paragraph)
                .name("SOP Heading 2")
                .size(24)
                .bold()
                .color("000000"),
        )
        .add_abstract_numbering(
            AbstractNumbering::new(NUM_TOC).add_level(
                Level::new(
                    0,
                    Start::new(1),
                    NumberFormat::new("decimal"),
                    LevelText::new("%1."),
                    LevelJc::new("left"),
                )
                .indent(Some(720), Some(SpecialIndentType::Hanging(360)), None, None),
            ),
        )
        .add_numbering(Numbering::new(NUM_TOC, NUM_TOC))
        .add_abstract_numbering(
            AbstractNumbering::new(NUM_BULLET).add_level(
                Level::new(
                    0,
                    Start::new(1),
                    NumberFormat::new("bullet"),
                    LevelText::new("•"),
                    LevelJc::new("left"),
                )
                .indent(Some(720), Some(SpecialIndentType::Hanging(360)), None, None),
            ),
        )
        .add_numbering(Numbering::new(NUM_BULLET, NUM_BULLET))
}

fn para(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text))
}

fn styled(text: &str, style: &str) -> Paragraph {
    para(text).style(style)
}

fn spacer() -> Paragraph {
    Paragraph::new()
}

fn page_break() -> Paragraph {
    Paragraph::new().add_run(Run::new().add_break(BreakType::Page))
}

fn cell(text: &str) -> TableCell {
    TableCell::new().add_paragraph(para(text))
}

/// Single-line borders on all four sides and between all cells.
///
/// Size 4 is eighth-points — the 0.5 pt hairline Word draws for plain
/// tables. Applied to every table in the template, no exceptions.
fn bordered(table: Table) -> Table {
    let borders = TableBorders::new()
        .set(edge(TableBorderPosition::Top))
        .set(edge(TableBorderPosition::Left))
        .set(edge(TableBorderPosition::Bottom))
        .set(edge(TableBorderPosition::Right))
        .set(edge(TableBorderPosition::InsideH))
        .set(edge(TableBorderPosition::InsideV));
    table.set_borders(borders)
}

fn edge(position: TableBorderPosition) -> TableBorder {
    TableBorder::new(position)
        .border_type(BorderType::Single)
        .size(4)
        .color("000000")
}

/// A bordered table with one header row and `rows - 1` empty rows.
///
/// The header cells carry the fixed column names; the remaining cells are
/// left blank for process owners to fill in after generation.
fn header_table(rows: usize, headers: &[&str]) -> Table {
    let cols = headers.len();
    let mut table_rows = Vec::with_capacity(rows);

    table_rows.push(TableRow::new(headers.iter().map(|h| cell(h)).collect()));
    for _ in 1..rows {
        table_rows.push(TableRow::new(vec![cell(""); cols]));
    }

    // Even column widths across the 6.5 in content area (9360 twips).
    let grid = vec![9360 / cols; cols];
    bordered(Table::new(table_rows).set_grid(grid))
}

// ── Template sections, in order ──────────────────────────────────────────

/// Cover block — only emitted when the record carries a title.
fn title_block(mut docx: Docx, record: &AnalysisRecord) -> Docx {
    let Some(title) = &record.title else {
        return docx;
    };

    // Push the title towards the vertical center of the cover page.
    for _ in 0..9 {
        docx = docx.add_paragraph(spacer());
    }
    docx.add_paragraph(
        styled(title, STYLE_TITLE).align(AlignmentType::Center),
    )
    .add_paragraph(
        styled("Standard Operating Procedure", STYLE_SUBTITLE).align(AlignmentType::Center),
    )
    .add_paragraph(spacer())
    .add_paragraph(page_break())
}

fn document_history(docx: Docx) -> Docx {
    docx.add_paragraph(styled("Document History", STYLE_HEADING))
        .add_paragraph(styled("Document Location", STYLE_SUBHEADING))
        .add_paragraph(para(
            "This is an on-line document. Paper copies are valid only on the day they are \
             printed. Refer to the approver for the location where the last version of the \
             document is stored or if you are in any doubt about the accuracy of this document",
        ))
        .add_paragraph(styled("Document Creation", STYLE_SUBHEADING))
        .add_table(header_table(
            2,
            &["Creation Date", "Approval by", "Customer approval by"],
        ))
        .add_paragraph(styled("Revision History", STYLE_SUBHEADING))
        .add_table(header_table(
            4,
            &[
                "Revision Date",
                "Version Number",
                "Change Reason",
                "Pages Changed",
                "Approval By",
            ],
        ))
        .add_paragraph(page_break())
}

fn table_of_contents(mut docx: Docx) -> Docx {
    docx = docx.add_paragraph(styled("Table of Contents", STYLE_HEADING));
    for item in TOC_ITEMS {
        docx = docx.add_paragraph(
            para(item).numbering(NumberingId::new(NUM_TOC), IndentLevel::new(0)),
        );
    }
    docx.add_paragraph(page_break())
}

fn overview(docx: Docx, record: &AnalysisRecord) -> Docx {
    docx.add_paragraph(styled("Overview", STYLE_HEADING))
        .add_paragraph(styled("     Purpose and Scope", STYLE_SUBHEADING))
        .add_paragraph(para(record.objective.as_deref().unwrap_or(MISSING)))
        .add_paragraph(styled("     Definitions", STYLE_SUBHEADING))
        .add_paragraph(styled("         Acronyms", STYLE_SUBHEADING))
        .add_table(header_table(4, &["Abbreviation:", "Long Form:"]))
        .add_paragraph(styled("         Definitions", STYLE_SUBHEADING))
        .add_table(header_table(4, &["Term:", "Definition:"]))
        .add_paragraph(page_break())
}

fn engagement_and_roles(docx: Docx) -> Docx {
    docx.add_paragraph(styled("System of Engagement", STYLE_HEADING))
        .add_paragraph(spacer())
        .add_paragraph(spacer())
        .add_paragraph(styled(
            "Roles and Responsibilities in performing this activity",
            STYLE_HEADING,
        ))
        .add_table(header_table(4, &["Role:", "Responsibility:"]))
        .add_paragraph(page_break())
}

fn process_narrative(
    docx: Docx,
    record: &AnalysisRecord,
    png: &[u8],
    diagram: &DynamicImage,
    image_width_inches: f32,
) -> Docx {
    // Fixed display width; height follows the diagram's aspect ratio.
    let width_emu = (image_width_inches * EMU_PER_INCH) as u32;
    let height_emu =
        (width_emu as u64 * diagram.height() as u64 / diagram.width().max(1) as u64) as u32;

    docx.add_paragraph(styled("Process Narrative", STYLE_HEADING))
        .add_paragraph(para(record.purpose.as_deref().unwrap_or(MISSING)))
        .add_paragraph(styled("Process Flow Map", STYLE_HEADING))
        .add_paragraph(spacer())
        .add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_image(Pic::new(png).size(width_emu, height_emu))),
        )
        .add_paragraph(page_break())
}

/// The variable section: prose, a step hierarchy, or nothing at all —
/// the heading is present regardless.
fn detailed_steps(mut docx: Docx, record: &AnalysisRecord) -> Docx {
    docx = docx.add_paragraph(styled("Detailed Process Steps", STYLE_HEADING));

    match &record.steps {
        None => docx,
        Some(Steps::Text(text)) => docx.add_paragraph(para(text)),
        Some(Steps::Structured(steps)) => {
            for step in steps {
                let heading = format!(
                    "Step {}: {}",
                    step.step.as_deref().unwrap_or(MISSING),
                    step.role.as_deref().unwrap_or(MISSING)
                );
                docx = docx.add_paragraph(styled(&heading, STYLE_SUBHEADING));

                for activity in &step.activities {
                    let task = format!("Task: {}", activity.task.as_deref().unwrap_or(MISSING));
                    docx = docx
                        .add_paragraph(Paragraph::new().add_run(Run::new().add_text(task).bold()));

                    for detail in &activity.details {
                        docx = docx.add_paragraph(
                            para(detail)
                                .numbering(NumberingId::new(NUM_BULLET), IndentLevel::new(0)),
                        );
                    }
                    docx = docx.add_paragraph(spacer());
                }
            }
            docx
        }
    }
}

/// Fixed closing boilerplate — present regardless of record content.
fn closing_sections(docx: Docx) -> Docx {
    docx.add_paragraph(spacer())
        .add_paragraph(styled("Process Exception Handling", STYLE_HEADING))
        .add_paragraph(spacer())
        .add_paragraph(styled("Compliance control", STYLE_HEADING))
        .add_paragraph(spacer())
        .add_paragraph(styled("Escalation Process", STYLE_HEADING))
        .add_table(header_table(
            3,
            &["Escalation Level:", "Name of Contact", "Title", "Email"],
        ))
        .add_paragraph(styled("Process SLAs", STYLE_HEADING))
        .add_table(header_table(
            4,
            &[
                "Indicator:",
                "Name",
                "Operational Definition",
                "Target",
                "Minimum Level",
            ],
        ))
        .add_paragraph(styled("Related Documents", STYLE_HEADING))
        .add_paragraph(spacer())
        .add_paragraph(styled("Sign Off", STYLE_HEADING))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn diagram() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 20, Rgba([0, 0, 0, 255])))
    }

    /// Unzip the produced docx and return `word/document.xml`.
    fn document_xml(bytes: &[u8]) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("docx must be a zip");
        let mut file = archive
            .by_name("word/document.xml")
            .expect("docx must contain word/document.xml");
        let mut xml = String::new();
        std::io::Read::read_to_string(&mut file, &mut xml).expect("document.xml must be UTF-8");
        xml
    }

    #[test]
    fn empty_record_still_produces_all_boilerplate() {
        let bytes = assemble(&AnalysisRecord::default(), &diagram(), 6.0).expect("must assemble");
        let xml = document_xml(&bytes);

        for section in [
            "Document History",
            "Table of Contents",
            "Overview",
            "Purpose and Scope",
            "Definitions",
            "System of Engagement",
            "Process Narrative",
            "Process Flow Map",
            "Detailed Process Steps",
            "Process Exception Handling",
            "Compliance control",
            "Escalation Process",
            "Process SLAs",
            "Related Documents",
            "Sign Off",
        ] {
            assert!(xml.contains(section), "missing boilerplate: {section}");
        }
        // Absent objective and purpose render as the sentinel.
        assert!(xml.contains(MISSING));
    }

    #[test]
    fn title_block_is_conditional() {
        let without = assemble(&AnalysisRecord::default(), &diagram(), 6.0).unwrap();
        assert!(!document_xml(&without).contains("Standard Operating Procedure"));

        let record = AnalysisRecord {
            title: Some("Order Intake".into()),
            ..Default::default()
        };
        let with = assemble(&record, &diagram(), 6.0).unwrap();
        let xml = document_xml(&with);
        assert!(xml.contains("Order Intake"));
        assert!(xml.contains("Standard Operating Procedure"));
    }

    #[test]
    fn every_table_has_full_single_borders() {
        let bytes = assemble(&AnalysisRecord::default(), &diagram(), 6.0).unwrap();
        let xml = document_xml(&bytes);

        let tables = xml.matches("<w:tbl>").count();
        assert_eq!(tables, 7, "the fixed template carries seven tables");
        assert_eq!(xml.matches("<w:tblBorders>").count(), tables);
        for side in ["w:top", "w:left", "w:bottom", "w:right", "w:insideH", "w:insideV"] {
            assert_eq!(
                xml.matches(&format!("<{side} w:val=\"single\"")).count(),
                tables,
                "every table needs a single {side} border"
            );
        }
    }

    #[test]
    fn text_steps_render_as_one_paragraph() {
        let record = AnalysisRecord {
            steps: Some(Steps::Text("Receive, validate, archive.".into())),
            ..Default::default()
        };
        let bytes = assemble(&record, &diagram(), 6.0).unwrap();
        assert!(document_xml(&bytes).contains("Receive, validate, archive."));
    }

    #[test]
    fn image_is_embedded_in_the_package() {
        let bytes = assemble(&AnalysisRecord::default(), &diagram(), 6.0).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let has_media = (0..archive.len()).any(|i| {
            archive
                .by_index(i)
                .map(|f| f.name().starts_with("word/media/"))
                .unwrap_or(false)
        });
        assert!(has_media, "the diagram must land in word/media/");
    }
}
