//! `xl/drawings/drawing1.xml` and the relationships around it

use super::parts::{relationships_xml, Relationship, REL_DRAWING, REL_IMAGE};
use super::xml_writer::{render, XmlWriter};
use crate::assets::{DrawingAnchor, MediaPart};
use crate::error::Result;
use crate::layout::pixels_to_emu;
use std::io::Write;

pub const DRAWING_PART: &str = "xl/drawings/drawing1.xml";
pub const DRAWING_RELS_PART: &str = "xl/drawings/_rels/drawing1.xml.rels";
pub const SHEET1_RELS_PART: &str = "xl/worksheets/_rels/sheet1.xml.rels";

/// The worksheet's only relationship
pub const SHEET_DRAWING_REL_ID: &str = "rId1";

pub fn sheet_rels_xml() -> Result<Vec<u8>> {
    relationships_xml(&[Relationship::new(
        SHEET_DRAWING_REL_ID,
        REL_DRAWING,
        "../drawings/drawing1.xml",
    )])
}

pub fn drawing_rels_xml(media: &[MediaPart]) -> Result<Vec<u8>> {
    let rels: Vec<Relationship> = media
        .iter()
        .map(|m| Relationship::new(m.rel_id(), REL_IMAGE, format!("../media/{}", m.file_name())))
        .collect();
    relationships_xml(&rels)
}

pub fn drawing_xml(anchors: &[DrawingAnchor]) -> Result<Vec<u8>> {
    render(|w| {
        w.declaration()?;
        w.start_element("xdr:wsDr")?;
        w.attribute(
            "xmlns:xdr",
            "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing",
        )?;
        w.attribute("xmlns:a", "http://schemas.openxmlformats.org/drawingml/2006/main")?;
        w.attribute(
            "xmlns:r",
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships",
        )?;
        w.close_start_tag()?;

        for anchor in anchors {
            write_anchor(w, anchor)?;
        }

        w.end_element("xdr:wsDr")
    })
}

/// A picture pinned to its cell's top-left corner, shifted down by the
/// stack offset, at native pixel size
fn write_anchor<W: Write>(w: &mut XmlWriter<W>, anchor: &DrawingAnchor) -> Result<()> {
    let cx = pixels_to_emu(anchor.width_px);
    let cy = pixels_to_emu(anchor.height_px);
    let mut buf = itoa::Buffer::new();

    w.write_str("<xdr:oneCellAnchor><xdr:from><xdr:col>")?;
    w.write_str(buf.format(anchor.column - 1))?;
    w.write_str("</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>")?;
    w.write_str(buf.format(anchor.row - 1))?;
    w.write_str("</xdr:row><xdr:rowOff>")?;
    w.write_str(buf.format(pixels_to_emu(anchor.row_offset_px)))?;
    w.write_str("</xdr:rowOff></xdr:from>")?;

    w.start_element("xdr:ext")?;
    w.attribute_int("cx", cx)?;
    w.attribute_int("cy", cy)?;
    w.close_empty()?;

    w.write_str("<xdr:pic><xdr:nvPicPr>")?;
    w.start_element("xdr:cNvPr")?;
    w.attribute_int("id", anchor.shape_id)?;
    w.attribute("name", &format!("Picture {}", anchor.shape_id))?;
    w.close_empty()?;
    w.write_str("<xdr:cNvPicPr><a:picLocks noChangeAspect=\"1\"/></xdr:cNvPicPr></xdr:nvPicPr>")?;

    w.write_str("<xdr:blipFill>")?;
    w.start_element("a:blip")?;
    w.attribute("r:embed", &format!("rId{}", anchor.media_number))?;
    w.close_empty()?;
    w.write_str("<a:stretch><a:fillRect/></a:stretch></xdr:blipFill>")?;

    w.write_str("<xdr:spPr><a:xfrm><a:off x=\"0\" y=\"0\"/>")?;
    w.start_element("a:ext")?;
    w.attribute_int("cx", cx)?;
    w.attribute_int("cy", cy)?;
    w.close_empty()?;
    w.write_str("</a:xfrm><a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></xdr:spPr></xdr:pic>")?;

    w.write_str("<xdr:clientData/></xdr:oneCellAnchor>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::ImageAsset;
    use std::sync::Arc;

    #[test]
    fn test_anchor_geometry() {
        let anchors = [DrawingAnchor {
            shape_id: 2,
            media_number: 1,
            row: 3,
            column: 2,
            row_offset_px: 104,
            width_px: 100,
            height_px: 50,
        }];
        let xml = String::from_utf8(drawing_xml(&anchors).unwrap()).unwrap();

        assert!(xml.contains("<xdr:col>1</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>2</xdr:row><xdr:rowOff>990600</xdr:rowOff>"));
        assert!(xml.contains("<xdr:ext cx=\"952500\" cy=\"476250\"/>"));
        assert!(xml.contains("<xdr:cNvPr id=\"2\" name=\"Picture 2\"/>"));
        assert!(xml.contains("<a:blip r:embed=\"rId1\"/>"));
    }

    #[test]
    fn test_drawing_rels_target_media() {
        let media = [MediaPart {
            number: 1,
            asset: Arc::new(ImageAsset {
                bytes: vec![1, 2, 3],
                mime: "image/jpeg".to_string(),
                extension: "jpg".to_string(),
                width_px: 1,
                height_px: 1,
            }),
        }];
        let xml = String::from_utf8(drawing_rels_xml(&media).unwrap()).unwrap();
        assert!(xml.contains("Id=\"rId1\""));
        assert!(xml.contains("Target=\"../media/image1.jpg\""));

        let sheet = String::from_utf8(sheet_rels_xml().unwrap()).unwrap();
        assert!(sheet.contains("Target=\"../drawings/drawing1.xml\""));
    }
}
