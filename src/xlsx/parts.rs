//! Package-level XML parts: content types, relationships, workbook, styles,
//! theme and document properties.

use super::xml_writer::{render, XmlWriter};
use crate::error::Result;
use crate::assets::image::mime_for_extension;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::io::Write;

pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const REL_CORE_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
pub const REL_EXTENDED_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties";
pub const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
pub const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub const REL_THEME: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
pub const REL_SHARED_STRINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";
pub const REL_DRAWING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
pub const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PACKAGE_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const CT_WORKSHEET: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

const SHEET_NAME_MAX_CHARS: usize = 31;

/// One `<Relationship>` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: &'static str,
    pub target: String,
}

impl Relationship {
    pub fn new(id: impl Into<String>, rel_type: &'static str, target: impl Into<String>) -> Self {
        Relationship {
            id: id.into(),
            rel_type,
            target: target.into(),
        }
    }
}

pub fn relationships_xml(relationships: &[Relationship]) -> Result<Vec<u8>> {
    render(|w| {
        w.declaration()?;
        w.start_element("Relationships")?;
        w.attribute("xmlns", NS_PACKAGE_RELATIONSHIPS)?;
        w.close_start_tag()?;
        for rel in relationships {
            w.start_element("Relationship")?;
            w.attribute("Id", &rel.id)?;
            w.attribute("Type", rel.rel_type)?;
            w.attribute("Target", &rel.target)?;
            w.close_empty()?;
        }
        w.end_element("Relationships")
    })
}

/// `_rels/.rels`
pub fn root_rels_xml() -> Result<Vec<u8>> {
    relationships_xml(&[
        Relationship::new("rId1", REL_OFFICE_DOCUMENT, "xl/workbook.xml"),
        Relationship::new("rId2", REL_CORE_PROPERTIES, "docProps/core.xml"),
        Relationship::new("rId3", REL_EXTENDED_PROPERTIES, "docProps/app.xml"),
    ])
}

/// `xl/_rels/workbook.xml.rels`: sheets take `rId1..rIdN`, then styles,
/// theme and shared strings.
pub fn workbook_rels_xml(sheet_count: usize) -> Result<Vec<u8>> {
    let mut rels: Vec<Relationship> = (1..=sheet_count)
        .map(|n| Relationship::new(format!("rId{}", n), REL_WORKSHEET, format!("worksheets/sheet{}.xml", n)))
        .collect();
    rels.push(Relationship::new(format!("rId{}", sheet_count + 1), REL_STYLES, "styles.xml"));
    rels.push(Relationship::new(format!("rId{}", sheet_count + 2), REL_THEME, "theme/theme1.xml"));
    rels.push(Relationship::new(
        format!("rId{}", sheet_count + 3),
        REL_SHARED_STRINGS,
        "sharedStrings.xml",
    ));
    relationships_xml(&rels)
}

/// `xl/workbook.xml`
pub fn workbook_xml(sheet_names: &[String]) -> Result<Vec<u8>> {
    render(|w| {
        w.declaration()?;
        w.start_element("workbook")?;
        w.attribute("xmlns", NS_MAIN)?;
        w.attribute("xmlns:r", NS_RELATIONSHIPS)?;
        w.close_start_tag()?;

        w.write_str("<bookViews><workbookView xWindow=\"0\" yWindow=\"0\" windowWidth=\"28800\" windowHeight=\"12300\" activeTab=\"0\"/></bookViews>")?;

        w.start_element("sheets")?;
        w.close_start_tag()?;
        for (i, name) in sheet_names.iter().enumerate() {
            w.start_element("sheet")?;
            w.attribute("name", name)?;
            w.attribute_int("sheetId", i + 1)?;
            w.attribute("r:id", &format!("rId{}", i + 1))?;
            w.close_empty()?;
        }
        w.end_element("sheets")?;
        w.end_element("workbook")
    })
}

/// What `[Content_Types].xml` has to declare
#[derive(Debug, Clone, Default)]
pub struct ContentTypes<'a> {
    pub sheet_count: usize,
    pub has_drawing: bool,
    pub image_extensions: BTreeSet<&'a str>,
    pub pdf_parts: Vec<String>,
}

impl ContentTypes<'_> {
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        render(|w| {
            w.declaration()?;
            w.start_element("Types")?;
            w.attribute("xmlns", "http://schemas.openxmlformats.org/package/2006/content-types")?;
            w.close_start_tag()?;

            default_type(w, "rels", "application/vnd.openxmlformats-package.relationships+xml")?;
            default_type(w, "xml", "application/xml")?;
            for ext in &self.image_extensions {
                default_type(w, ext, mime_for_extension(ext))?;
            }

            override_type(
                w,
                "/xl/workbook.xml",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
            )?;
            for n in 1..=self.sheet_count {
                override_type(w, &format!("/xl/worksheets/sheet{}.xml", n), CT_WORKSHEET)?;
            }
            override_type(
                w,
                "/xl/theme/theme1.xml",
                "application/vnd.openxmlformats-officedocument.theme+xml",
            )?;
            override_type(
                w,
                "/xl/styles.xml",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml",
            )?;
            override_type(
                w,
                "/xl/sharedStrings.xml",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml",
            )?;
            if self.has_drawing {
                override_type(
                    w,
                    "/xl/drawings/drawing1.xml",
                    "application/vnd.openxmlformats-officedocument.drawing+xml",
                )?;
            }
            for part in &self.pdf_parts {
                override_type(w, &format!("/{}", part), "application/pdf")?;
            }
            override_type(
                w,
                "/docProps/core.xml",
                "application/vnd.openxmlformats-package.core-properties+xml",
            )?;
            override_type(
                w,
                "/docProps/app.xml",
                "application/vnd.openxmlformats-officedocument.extended-properties+xml",
            )?;

            w.end_element("Types")
        })
    }
}

fn default_type<W: Write>(w: &mut XmlWriter<W>, extension: &str, content_type: &str) -> Result<()> {
    w.start_element("Default")?;
    w.attribute("Extension", extension)?;
    w.attribute("ContentType", content_type)?;
    w.close_empty()
}

fn override_type<W: Write>(w: &mut XmlWriter<W>, part_name: &str, content_type: &str) -> Result<()> {
    w.start_element("Override")?;
    w.attribute("PartName", part_name)?;
    w.attribute("ContentType", content_type)?;
    w.close_empty()
}

/// Values for `docProps/core.xml` and `docProps/app.xml`
#[derive(Debug, Clone)]
pub struct DocProperties {
    pub title: String,
    pub creator: String,
    pub company: String,
    pub application: String,
    pub created: DateTime<Utc>,
}

pub fn core_xml(props: &DocProperties) -> Result<Vec<u8>> {
    let timestamp = props.created.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    render(|w| {
        w.declaration()?;
        w.write_str(
            "<cp:coreProperties \
             xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" \
             xmlns:dc=\"http://purl.org/dc/elements/1.1/\" \
             xmlns:dcterms=\"http://purl.org/dc/terms/\" \
             xmlns:dcmitype=\"http://purl.org/dc/dcmitype/\" \
             xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">",
        )?;
        w.text_element("dc:title", &props.title)?;
        w.text_element("dc:creator", &props.creator)?;
        w.text_element("cp:lastModifiedBy", &props.creator)?;
        w.write_str("<dcterms:created xsi:type=\"dcterms:W3CDTF\">")?;
        w.write_str(&timestamp)?;
        w.write_str("</dcterms:created><dcterms:modified xsi:type=\"dcterms:W3CDTF\">")?;
        w.write_str(&timestamp)?;
        w.write_str("</dcterms:modified>")?;
        w.end_element("cp:coreProperties")
    })
}

pub fn app_xml(props: &DocProperties, sheet_names: &[String]) -> Result<Vec<u8>> {
    render(|w| {
        w.declaration()?;
        w.write_str(
            "<Properties \
             xmlns=\"http://schemas.openxmlformats.org/officeDocument/2006/extended-properties\" \
             xmlns:vt=\"http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes\">",
        )?;
        w.text_element("Application", &props.application)?;
        w.write_str("<DocSecurity>0</DocSecurity><ScaleCrop>false</ScaleCrop>")?;

        w.write_str("<HeadingPairs><vt:vector size=\"2\" baseType=\"variant\"><vt:variant><vt:lpstr>Worksheets</vt:lpstr></vt:variant><vt:variant>")?;
        w.text_element("vt:i4", &sheet_names.len().to_string())?;
        w.write_str("</vt:variant></vt:vector></HeadingPairs>")?;

        w.write_str("<TitlesOfParts>")?;
        w.start_element("vt:vector")?;
        w.attribute_int("size", sheet_names.len())?;
        w.attribute("baseType", "lpstr")?;
        w.close_start_tag()?;
        for name in sheet_names {
            w.text_element("vt:lpstr", name)?;
        }
        w.write_str("</vt:vector></TitlesOfParts>")?;

        w.text_element("Company", &props.company)?;
        w.write_str(
            "<LinksUpToDate>false</LinksUpToDate><SharedDoc>false</SharedDoc>\
             <HyperlinksChanged>false</HyperlinksChanged><AppVersion>16.0300</AppVersion>",
        )?;
        w.end_element("Properties")
    })
}

/// Excel-safe sheet name: no `\ / * [ ] ? :`, trimmed, at most 31 characters
pub fn sanitize_sheet_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '\\' | '/' | '*' | '[' | ']' | '?' | ':' => ' ',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        return "Sheet".to_string();
    }
    trimmed
        .chars()
        .take(SHEET_NAME_MAX_CHARS)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Sanitized `name`, suffixed `" (2)"`, `" (3)"`, ... until it matches none
/// of `taken` case-insensitively. The stem is shortened so the suffix always
/// fits in 31 characters.
pub fn unique_sheet_name(name: &str, taken: &[String]) -> String {
    let base = sanitize_sheet_name(name);
    let clashes = |candidate: &str| {
        let candidate = candidate.to_lowercase();
        taken.iter().any(|t| t.to_lowercase() == candidate)
    };
    if !clashes(&base) {
        return base;
    }

    let mut n = 2u32;
    loop {
        let suffix = format!(" ({})", n);
        let stem: String = base
            .chars()
            .take(SHEET_NAME_MAX_CHARS - suffix.chars().count())
            .collect();
        let candidate = format!("{}{}", stem.trim_end(), suffix);
        if !clashes(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// `xl/styles.xml`. Cell formats: 0 default, 1 header, 2 body.
pub const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="2">
<font><sz val="11"/><color theme="1"/><name val="Calibri"/><family val="2"/><scheme val="minor"/></font>
<font><b/><sz val="11"/><color theme="1"/><name val="Calibri"/><family val="2"/><scheme val="minor"/></font>
</fonts>
<fills count="2">
<fill><patternFill patternType="none"/></fill>
<fill><patternFill patternType="gray125"/></fill>
</fills>
<borders count="1">
<border><left/><right/><top/><bottom/><diagonal/></border>
</borders>
<cellStyleXfs count="1">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
</cellStyleXfs>
<cellXfs count="3">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
<xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1" applyAlignment="1"><alignment horizontal="left" vertical="center" wrapText="1"/></xf>
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0" applyAlignment="1"><alignment horizontal="left" vertical="top" wrapText="1"/></xf>
</cellXfs>
<cellStyles count="1">
<cellStyle name="Normal" xfId="0" builtinId="0"/>
</cellStyles>
<dxfs count="0"/>
<tableStyles count="0" defaultTableStyle="TableStyleMedium2" defaultPivotStyle="PivotStyleLight16"/>
</styleSheet>"#;

/// `xl/theme/theme1.xml`
pub const THEME_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme">
<a:themeElements>
<a:clrScheme name="Office">
<a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1>
<a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>
<a:dk2><a:srgbClr val="44546A"/></a:dk2>
<a:lt2><a:srgbClr val="E7E6E6"/></a:lt2>
<a:accent1><a:srgbClr val="4472C4"/></a:accent1>
<a:accent2><a:srgbClr val="ED7D31"/></a:accent2>
<a:accent3><a:srgbClr val="A5A5A5"/></a:accent3>
<a:accent4><a:srgbClr val="FFC000"/></a:accent4>
<a:accent5><a:srgbClr val="5B9BD5"/></a:accent5>
<a:accent6><a:srgbClr val="70AD47"/></a:accent6>
<a:hlink><a:srgbClr val="0563C1"/></a:hlink>
<a:folHlink><a:srgbClr val="954F72"/></a:folHlink>
</a:clrScheme>
<a:fontScheme name="Office">
<a:majorFont><a:latin typeface="Calibri Light" panose="020F0302020204030204"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont>
<a:minorFont><a:latin typeface="Calibri" panose="020F0502020204030204"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont>
</a:fontScheme>
<a:fmtScheme name="Office">
<a:fillStyleLst>
<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
<a:gradFill rotWithShape="1"><a:gsLst><a:gs pos="0"><a:schemeClr val="phClr"><a:lumMod val="110000"/><a:satMod val="105000"/><a:tint val="67000"/></a:schemeClr></a:gs><a:gs pos="50000"><a:schemeClr val="phClr"><a:lumMod val="105000"/><a:satMod val="103000"/><a:tint val="73000"/></a:schemeClr></a:gs><a:gs pos="100000"><a:schemeClr val="phClr"><a:lumMod val="105000"/><a:satMod val="109000"/><a:tint val="81000"/></a:schemeClr></a:gs></a:gsLst><a:lin ang="5400000" scaled="0"/></a:gradFill>
<a:gradFill rotWithShape="1"><a:gsLst><a:gs pos="0"><a:schemeClr val="phClr"><a:satMod val="103000"/><a:lumMod val="102000"/><a:tint val="94000"/></a:schemeClr></a:gs><a:gs pos="50000"><a:schemeClr val="phClr"><a:satMod val="110000"/><a:lumMod val="100000"/><a:shade val="100000"/></a:schemeClr></a:gs><a:gs pos="100000"><a:schemeClr val="phClr"><a:lumMod val="99000"/><a:satMod val="120000"/><a:shade val="78000"/></a:schemeClr></a:gs></a:gsLst><a:lin ang="5400000" scaled="0"/></a:gradFill>
</a:fillStyleLst>
<a:lnStyleLst>
<a:ln w="6350" cap="flat" cmpd="sng" algn="ctr"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:prstDash val="solid"/><a:miter lim="800000"/></a:ln>
<a:ln w="12700" cap="flat" cmpd="sng" algn="ctr"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:prstDash val="solid"/><a:miter lim="800000"/></a:ln>
<a:ln w="19050" cap="flat" cmpd="sng" algn="ctr"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:prstDash val="solid"/><a:miter lim="800000"/></a:ln>
</a:lnStyleLst>
<a:effectStyleLst>
<a:effectStyle><a:effectLst/></a:effectStyle>
<a:effectStyle><a:effectLst/></a:effectStyle>
<a:effectStyle><a:effectLst><a:outerShdw blurRad="57150" dist="19050" dir="5400000" algn="ctr" rotWithShape="0"><a:srgbClr val="000000"><a:alpha val="63000"/></a:srgbClr></a:outerShdw></a:effectLst></a:effectStyle>
</a:effectStyleLst>
<a:bgFillStyleLst>
<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
<a:solidFill><a:schemeClr val="phClr"><a:tint val="95000"/><a:satMod val="170000"/></a:schemeClr></a:solidFill>
<a:gradFill rotWithShape="1"><a:gsLst><a:gs pos="0"><a:schemeClr val="phClr"><a:tint val="93000"/><a:satMod val="150000"/><a:shade val="98000"/><a:lumMod val="102000"/></a:schemeClr></a:gs><a:gs pos="50000"><a:schemeClr val="phClr"><a:tint val="98000"/><a:satMod val="130000"/><a:shade val="90000"/><a:lumMod val="103000"/></a:schemeClr></a:gs><a:gs pos="100000"><a:schemeClr val="phClr"><a:shade val="63000"/><a:satMod val="120000"/></a:schemeClr></a:gs></a:gsLst><a:lin ang="5400000" scaled="0"/></a:gradFill>
</a:bgFillStyleLst>
</a:fmtScheme>
</a:themeElements>
<a:objectDefaults/>
<a:extraClrSchemeLst/>
</a:theme>"#;
