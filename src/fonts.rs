use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use memmap2::Mmap;
use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face;

use crate::style::FontStyle;

/// (normalized family, bold, italic) -> (file path, face index within TTC)
type FontLookup = HashMap<(String, bool, bool), (PathBuf, u32)>;

static SYSTEM_FONTS: OnceLock<FontLookup> = OnceLock::new();

/// Family names compare without case, spaces, dashes or underscores, so
/// "OpenSans" finds "Open Sans".
pub(crate) fn family_key(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn font_family_name(face: &Face) -> Option<String> {
    face.names()
        .into_iter()
        .find(|name| name.name_id == ttf_parser::name_id::FAMILY && name.is_unicode())
        .and_then(|name| name.to_string())
}

fn read_font_style(data: &[u8], face_index: u32) -> Option<(String, bool, bool)> {
    let face = Face::parse(data, face_index).ok()?;
    let family = font_family_name(&face)?;
    Some((family, face.is_bold(), face.is_italic()))
}

fn system_font_directories() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    if let Ok(val) = std::env::var("TOPIC_PDF_FONTS") {
        let sep = if cfg!(windows) { ';' } else { ':' };
        dirs.extend(
            val.split(sep)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        );
    }

    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/Library/Fonts".into(),
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
        ]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend(["/usr/share/fonts".into(), "/usr/local/share/fonts".into()]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        } else {
            dirs.push("C:\\Windows\\Fonts".into());
        }
    }

    dirs
}

fn is_font_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("ttf" | "otf" | "ttc")
    )
}

fn is_font_collection(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ttc"))
}

/// Walks `dirs` recursively and indexes every face by family and style.
/// Earlier directories win on duplicates.
fn scan_font_dirs(dirs: Vec<PathBuf>) -> FontLookup {
    let t0 = std::time::Instant::now();
    let mut index = FontLookup::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut files_parsed = 0u32;

    // Reverse so the first directory is popped first.
    let mut stack: Vec<PathBuf> = dirs.into_iter().rev().collect();
    while let Some(dir) = stack.pop() {
        if !visited.insert(dir.clone()) {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };

        let mut subdirs = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                subdirs.push(path);
                continue;
            }
            if !is_font_file(&path) {
                continue;
            }
            let Ok(file) = std::fs::File::open(&path) else {
                continue;
            };
            let Ok(data) = (unsafe { Mmap::map(&file) }) else {
                continue;
            };
            files_parsed += 1;
            let face_count = if is_font_collection(&path) {
                ttf_parser::fonts_in_collection(&data).unwrap_or(1)
            } else {
                1
            };
            for face_index in 0..face_count {
                if let Some((family, bold, italic)) = read_font_style(&data, face_index) {
                    index
                        .entry((family_key(&family), bold, italic))
                        .or_insert((path.clone(), face_index));
                }
            }
        }
        stack.extend(subdirs.into_iter().rev());
    }

    log::info!(
        "Font scan: {:.1}ms, {} dirs, {} files parsed → {} entries",
        t0.elapsed().as_secs_f64() * 1000.0,
        visited.len(),
        files_parsed,
        index.len(),
    );

    index
}

fn system_fonts() -> &'static FontLookup {
    SYSTEM_FONTS.get_or_init(|| scan_font_dirs(system_font_directories()))
}

/// Windows-1252 (WinAnsi) byte to Unicode char mapping.
/// Bytes 0x80-0x9F are remapped; all others map directly to their Unicode codepoint.
fn winansi_to_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        _ => byte as char,
    }
}

/// Map a single Unicode char to its WinAnsi byte, or `None` if unmappable.
fn char_to_winansi(c: char) -> Option<u8> {
    let byte = match c as u32 {
        0x0020..=0x007F | 0x00A0..=0x00FF => c as u8,
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => return None,
    };
    Some(byte)
}

/// Text as WinAnsi bytes; unmappable chars become '?'.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars().map(|c| char_to_winansi(c).unwrap_or(b'?')).collect()
}

/// Encode UTF-8 text as big-endian 2-byte glyph IDs for CIDFont content streams.
fn encode_as_gids(text: &str, char_to_gid: &HashMap<char, u16>) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for ch in text.chars() {
        let gid = char_to_gid.get(&ch).copied().unwrap_or(0);
        out.extend(gid.to_be_bytes());
    }
    out
}

/// Standard 14 fonts used when no TrueType file matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Builtin {
    Helvetica,
    Courier,
}

impl Builtin {
    fn for_family(family: &str) -> Self {
        let key = family_key(family);
        if key.contains("mono") || key.contains("courier") {
            Builtin::Courier
        } else {
            Builtin::Helvetica
        }
    }

    fn base_font(self, bold: bool, italic: bool) -> &'static str {
        match (self, bold, italic) {
            (Builtin::Helvetica, false, false) => "Helvetica",
            (Builtin::Helvetica, true, false) => "Helvetica-Bold",
            (Builtin::Helvetica, false, true) => "Helvetica-Oblique",
            (Builtin::Helvetica, true, true) => "Helvetica-BoldOblique",
            (Builtin::Courier, false, false) => "Courier",
            (Builtin::Courier, true, false) => "Courier-Bold",
            (Builtin::Courier, false, true) => "Courier-Oblique",
            (Builtin::Courier, true, true) => "Courier-BoldOblique",
        }
    }

    /// Approximate advance at 1000 units/em.
    fn width_1000(self, byte: u8) -> f32 {
        if self == Builtin::Courier {
            return 600.0;
        }
        match byte {
            32 => 278.0,
            33..=47 => 333.0,
            48..=57 => 556.0,
            58..=64 => 333.0,
            73 | 74 => 278.0,
            77 => 833.0,
            65..=90 => 667.0,
            91..=96 => 333.0,
            102 | 105 | 106 | 108 | 116 => 278.0,
            109 | 119 => 833.0,
            _ => 556.0,
        }
    }
}

enum FaceSource {
    TrueType {
        data: Vec<u8>,
        face_index: u32,
        units_per_em: f32,
        name: String,
    },
    Builtin(Builtin),
}

/// One family/style combination as used by the document.
pub(crate) struct LoadedFont {
    pub(crate) pdf_name: String,
    bold: bool,
    italic: bool,
    source: FaceSource,
    /// Advances for WinAnsi 32..=255 at 1000 units/em.
    widths_1000: Vec<f32>,
    used_chars: HashSet<char>,
}

impl LoadedFont {
    fn truetype(pdf_name: String, name: String, data: Vec<u8>, face_index: u32, bold: bool, italic: bool) -> Option<Self> {
        let face = Face::parse(&data, face_index).ok()?;
        let units_per_em = face.units_per_em() as f32;
        let widths_1000 = (32u8..=255u8)
            .map(|byte| {
                face.glyph_index(winansi_to_char(byte))
                    .and_then(|gid| face.glyph_hor_advance(gid))
                    .map(|adv| adv as f32 / units_per_em * 1000.0)
                    .unwrap_or(0.0)
            })
            .collect();
        drop(face);
        Some(Self {
            pdf_name,
            bold,
            italic,
            source: FaceSource::TrueType {
                data,
                face_index,
                units_per_em,
                name,
            },
            widths_1000,
            used_chars: HashSet::new(),
        })
    }

    fn builtin(pdf_name: String, builtin: Builtin, bold: bool, italic: bool) -> Self {
        Self {
            pdf_name,
            bold,
            italic,
            source: FaceSource::Builtin(builtin),
            widths_1000: (32u8..=255u8).map(|b| builtin.width_1000(b)).collect(),
            used_chars: HashSet::new(),
        }
    }

    fn char_width_1000(&self, ch: char) -> f32 {
        if let Some(byte) = char_to_winansi(ch).filter(|&b| b >= 32) {
            return self.widths_1000[(byte - 32) as usize];
        }
        match &self.source {
            FaceSource::TrueType {
                data,
                face_index,
                units_per_em,
                ..
            } => Face::parse(data, *face_index)
                .ok()
                .and_then(|face| face.glyph_index(ch).and_then(|gid| face.glyph_hor_advance(gid)))
                .map(|adv| adv as f32 / units_per_em * 1000.0)
                .unwrap_or(0.0),
            FaceSource::Builtin(builtin) => builtin.width_1000(b'?'),
        }
    }

    /// Width of `text` in points at `size`.
    pub(crate) fn text_width(&self, text: &str, size: f32) -> f32 {
        text.chars()
            .map(|ch| self.char_width_1000(ch) * size / 1000.0)
            .sum()
    }
}

fn postscript_name(family: &str, style: FontStyle) -> String {
    let base: String = family.chars().filter(|c| !c.is_whitespace()).collect();
    match (style.bold, style.italic) {
        (false, false) => base,
        (true, false) => format!("{base}-Bold"),
        (false, true) => format!("{base}-Italic"),
        (true, true) => format!("{base}-BoldItalic"),
    }
}

/// A font written to the PDF, ready to encode text for content streams.
pub(crate) struct EmbeddedFont {
    pub(crate) pdf_name: String,
    pub(crate) font_ref: Ref,
    char_to_gid: Option<HashMap<char, u16>>,
}

impl EmbeddedFont {
    pub(crate) fn encode(&self, text: &str) -> Vec<u8> {
        match &self.char_to_gid {
            Some(map) => encode_as_gids(text, map),
            None => to_winansi_bytes(text),
        }
    }
}

/// Fonts requested while laying out a document. Glyph usage is tracked so
/// the TrueType faces can be subset when the PDF is written.
pub(crate) struct FontBook {
    configured: FontLookup,
    fonts: Vec<LoadedFont>,
    by_key: HashMap<(String, bool, bool), usize>,
}

impl FontBook {
    pub(crate) fn new(font_dirs: &[PathBuf]) -> Self {
        let configured = if font_dirs.is_empty() {
            FontLookup::new()
        } else {
            scan_font_dirs(font_dirs.to_vec())
        };
        Self {
            configured,
            fonts: Vec::new(),
            by_key: HashMap::new(),
        }
    }

    /// Configured directories first, then the system index. Falls back to the
    /// regular face when the requested style has no file of its own.
    fn find_font_file(&self, key: &str, bold: bool, italic: bool) -> Option<(PathBuf, u32)> {
        let lookup = |index: &FontLookup| {
            index
                .get(&(key.to_string(), bold, italic))
                .or_else(|| index.get(&(key.to_string(), false, false)))
                .cloned()
        };
        lookup(&self.configured).or_else(|| lookup(system_fonts()))
    }

    /// Index of the font for `family` in `style`, loading it on first use.
    pub(crate) fn resolve(&mut self, family: &str, style: FontStyle) -> usize {
        let key = (family_key(family), style.bold, style.italic);
        if let Some(&id) = self.by_key.get(&key) {
            return id;
        }

        let t0 = std::time::Instant::now();
        let pdf_name = format!("F{}", self.fonts.len() + 1);
        let loaded = self
            .find_font_file(&key.0, style.bold, style.italic)
            .and_then(|(path, face_index)| {
                let data = std::fs::read(&path).ok()?;
                log::debug!("font {family} '{style}' → {}", path.display());
                LoadedFont::truetype(
                    pdf_name.clone(),
                    postscript_name(family, style),
                    data,
                    face_index,
                    style.bold,
                    style.italic,
                )
            })
            .unwrap_or_else(|| {
                let builtin = Builtin::for_family(family);
                log::warn!(
                    "Font not found: {family} bold={} italic={}, using {}",
                    style.bold,
                    style.italic,
                    builtin.base_font(style.bold, style.italic)
                );
                LoadedFont::builtin(pdf_name, builtin, style.bold, style.italic)
            });
        log::debug!(
            "resolve font {family} → {:.1}ms",
            t0.elapsed().as_secs_f64() * 1000.0
        );

        self.fonts.push(loaded);
        let id = self.fonts.len() - 1;
        self.by_key.insert(key, id);
        id
    }

    pub(crate) fn get(&self, id: usize) -> &LoadedFont {
        &self.fonts[id]
    }

    pub(crate) fn note_used(&mut self, id: usize, text: &str) {
        self.fonts[id].used_chars.extend(text.chars());
    }

    pub(crate) fn len(&self) -> usize {
        self.fonts.len()
    }

    /// Writes every loaded font to `pdf`, subsetting TrueType faces to the
    /// characters actually drawn.
    pub(crate) fn embed(&self, pdf: &mut Pdf, alloc: &mut impl FnMut() -> Ref) -> Vec<EmbeddedFont> {
        self.fonts
            .iter()
            .map(|font| {
                let font_ref = alloc();
                let char_to_gid = match &font.source {
                    FaceSource::TrueType {
                        data,
                        face_index,
                        name,
                        ..
                    } => embed_truetype(pdf, font_ref, name, data, *face_index, &font.used_chars, alloc),
                    FaceSource::Builtin(_) => None,
                };
                if char_to_gid.is_none() {
                    let builtin = match &font.source {
                        FaceSource::Builtin(b) => *b,
                        FaceSource::TrueType { name, .. } => Builtin::for_family(name),
                    };
                    pdf.type1_font(font_ref)
                        .base_font(Name(builtin.base_font(font.bold, font.italic).as_bytes()))
                        .encoding_predefined(Name(b"WinAnsiEncoding"));
                }
                EmbeddedFont {
                    pdf_name: font.pdf_name.clone(),
                    font_ref,
                    char_to_gid,
                }
            })
            .collect()
    }
}

/// Embed a TrueType/OpenType font as a CIDFont (Type0 composite) with Identity-H encoding.
/// The font data is subsetted to only include glyphs used in the document.
fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    font_name: &str,
    font_data: &[u8],
    face_index: u32,
    used_chars: &HashSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Option<HashMap<char, u16>> {
    let face = Face::parse(font_data, face_index).ok()?;
    let units = face.units_per_em() as f32;
    let scale = |v: f32| v / units * 1000.0;

    let bb = face.global_bounding_box();
    let bbox = Rect::new(
        scale(bb.x_min as f32),
        scale(bb.y_min as f32),
        scale(bb.x_max as f32),
        scale(bb.y_max as f32),
    );

    let mut remapper = subsetter::GlyphRemapper::new();
    let mut char_to_gid = HashMap::new();
    let mut gid_widths: Vec<(u16, f32)> = Vec::new();
    for &ch in used_chars {
        if let Some(gid) = face.glyph_index(ch) {
            let new_gid = remapper.remap(gid.0);
            char_to_gid.insert(ch, new_gid);
            let advance = face.glyph_hor_advance(gid).unwrap_or(0) as f32;
            gid_widths.push((new_gid, scale(advance)));
        }
    }
    gid_widths.sort_by_key(|&(gid, _)| gid);
    gid_widths.dedup_by_key(|&mut (gid, _)| gid);

    let subset_data = subsetter::subset(font_data, face_index, &remapper).unwrap_or_else(|e| {
        log::warn!("Font subsetting failed for {font_name}: {e}, embedding full font");
        font_data.to_vec()
    });

    let descriptor_ref = alloc();
    let data_ref = alloc();
    let cid_font_ref = alloc();
    let tounicode_ref = alloc();

    let data_len = i32::try_from(subset_data.len()).ok()?;
    pdf.stream(data_ref, &subset_data)
        .pair(Name(b"Length1"), data_len);

    pdf.font_descriptor(descriptor_ref)
        .name(Name(font_name.as_bytes()))
        .flags(pdf_writer::types::FontFlags::NON_SYMBOLIC)
        .bbox(bbox)
        .italic_angle(0.0)
        .ascent(scale(face.ascender() as f32))
        .descent(scale(face.descender() as f32))
        .cap_height(face.capital_height().map(|h| scale(h as f32)).unwrap_or(700.0))
        .stem_v(80.0)
        .font_file2(data_ref);

    let system_info = || pdf_writer::types::SystemInfo {
        registry: pdf_writer::Str(b"Adobe"),
        ordering: pdf_writer::Str(b"Identity"),
        supplement: 0,
    };
    {
        let mut cid = pdf.cid_font(cid_font_ref);
        cid.subtype(pdf_writer::types::CidFontType::Type2);
        cid.base_font(Name(font_name.as_bytes()));
        cid.system_info(system_info());
        cid.font_descriptor(descriptor_ref);
        cid.default_width(0.0);
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
        if !gid_widths.is_empty() {
            let mut widths = cid.widths();
            for &(gid, width) in &gid_widths {
                widths.consecutive(gid, [width]);
            }
        }
    }

    let cmap_name = format!("{font_name}-UTF16");
    let mut cmap = pdf_writer::types::UnicodeCmap::new(Name(cmap_name.as_bytes()), system_info());
    for (&ch, &new_gid) in &char_to_gid {
        cmap.pair(new_gid, ch);
    }
    let cmap_data = cmap.finish();
    pdf.stream(tounicode_ref, cmap_data.as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(font_name.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_font_ref)
        .to_unicode(tounicode_ref);

    Some(char_to_gid)
}
