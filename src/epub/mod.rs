//! EPUB writer. Packages one batch of chapters as an EPUB 3 file (mimetype, container, OPF,
//! nav.xhtml, toc.ncx, one XHTML document per chapter).

use crate::batch::Packager;
use crate::model::ChapterRecord;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_SLUG: &str = "bat-dau-muoi-lien-rut-sau-do-vo-dich";
pub const DEFAULT_TITLE: &str = "Bắt Đầu Mười Liên Rút Sau Đó Vô Địch";
pub const DEFAULT_LANGUAGE: &str = "vi";
const EXTENSION: &str = "epub";

const MIMETYPE: &[u8] = b"application/epub+zip";
const OEBPS_PREFIX: &str = "OEBPS/";
const CONTAINER_XML: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\n  <rootfiles>\n    <rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/>\n  </rootfiles>\n</container>";

/// Errors from the EPUB writer. These abort the run.
#[derive(Debug, Error)]
pub enum EpubError {
    #[error("Cannot write EPUB: batch has no chapters.")]
    EmptyBatch,

    #[error("Cannot create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create EPUB file: {path}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write EPUB archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl From<std::io::Error> for EpubError {
    fn from(e: std::io::Error) -> Self {
        EpubError::Zip(zip::result::ZipError::Io(e))
    }
}

/// Book-level metadata for one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookInfo {
    pub identifier: String,
    pub title: String,
    pub language: String,
}

/// Writes each batch to `{output_dir}/{slug}-{book_num}.epub`.
#[derive(Debug, Clone)]
pub struct EpubPackager {
    output_dir: PathBuf,
    slug: String,
    title: String,
    language: String,
}

impl Default for EpubPackager {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR, DEFAULT_SLUG, DEFAULT_TITLE)
    }
}

impl EpubPackager {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        slug: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            slug: slug.into(),
            title: title.into(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Deterministic output path; the same `book_num` always maps to the same file.
    pub fn book_path(&self, book_num: u32) -> PathBuf {
        self.output_dir
            .join(format!("{}-{}.{}", self.slug, book_num, EXTENSION))
    }

    pub fn book_info(&self, book_num: u32) -> BookInfo {
        BookInfo {
            identifier: format!("novel{}", book_num),
            title: format!("{} - Tập {}", self.title, book_num),
            language: self.language.clone(),
        }
    }
}

impl Packager for EpubPackager {
    fn package(&mut self, batch: &[ChapterRecord], book_num: u32) -> Result<PathBuf, EpubError> {
        if batch.is_empty() {
            return Err(EpubError::EmptyBatch);
        }
        std::fs::create_dir_all(&self.output_dir).map_err(|e| EpubError::CreateDir {
            path: self.output_dir.clone(),
            source: e,
        })?;
        let path = self.book_path(book_num);
        write_epub(batch, &self.book_info(book_num), &path)?;
        info!(
            book = book_num,
            chapters = batch.len(),
            path = %path.display(),
            "Wrote book {}",
            book_num
        );
        Ok(path)
    }
}

/// Write one batch as an EPUB 3 file, overwriting any existing file at `path`.
pub fn write_epub(
    chapters: &[ChapterRecord],
    book: &BookInfo,
    path: &Path,
) -> Result<(), EpubError> {
    if chapters.is_empty() {
        return Err(EpubError::EmptyBatch);
    }

    let file = std::fs::File::create(path).map_err(|e| EpubError::CreateFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut zip = ZipWriter::new(file);

    let options_stored = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    let options_deflate = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    // Mimetype first, uncompressed
    zip.start_file("mimetype", options_stored)?;
    zip.write_all(MIMETYPE)?;

    zip.start_file("META-INF/container.xml", options_deflate)?;
    zip.write_all(CONTAINER_XML)?;

    write_opf(chapters, book, &mut zip, options_deflate)?;
    write_nav_xhtml(chapters, book, &mut zip, options_deflate)?;
    write_ncx(chapters, book, &mut zip, options_deflate)?;
    write_chapters(chapters, book, &mut zip, options_deflate)?;

    zip.finish()?;
    Ok(())
}

fn chapter_file_name(ch: &ChapterRecord) -> String {
    format!("chap_{}.xhtml", ch.chapter_num)
}

fn chapter_id(ch: &ChapterRecord) -> String {
    format!("chap_{}", ch.chapter_num)
}

fn write_opf(
    chapters: &[ChapterRecord],
    book: &BookInfo,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut manifest = String::from(
        r#"    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
"#,
    );
    for ch in chapters {
        manifest.push_str(&format!(
            r#"    <item id="{}" href="{}" media-type="application/xhtml+xml"/>
"#,
            chapter_id(ch),
            chapter_file_name(ch)
        ));
    }

    // Reading order: nav page, then chapters in batch order.
    let mut spine = String::from("    <itemref idref=\"nav\"/>\n");
    for ch in chapters {
        spine.push_str(&format!("    <itemref idref=\"{}\"/>\n", chapter_id(ch)));
    }

    let modified = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="book-id" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">{id}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:language>{language}</dc:language>
    <meta property="dcterms:modified">{modified}</meta>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}  </spine>
</package>
"#,
        id = xml_escape(&book.identifier),
        title = xml_escape(&book.title),
        language = xml_escape(&book.language),
        modified = modified,
        manifest = manifest,
        spine = spine,
    );

    zip.start_file(format!("{}content.opf", OEBPS_PREFIX), options)?;
    zip.write_all(opf.as_bytes())?;
    Ok(())
}

fn write_nav_xhtml(
    chapters: &[ChapterRecord],
    book: &BookInfo,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut nav_links = String::new();
    for ch in chapters {
        nav_links.push_str(&format!(
            r#"      <li><a href="{}">{}</a></li>
"#,
            chapter_file_name(ch),
            xml_escape(&ch.title)
        ));
    }
    let lang = xml_escape(&book.language);
    let nav = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
</head>
<body>
  <nav epub:type="toc" id="toc">
    <h1>{title}</h1>
    <ol>
{links}    </ol>
  </nav>
</body>
</html>
"#,
        lang = lang,
        title = xml_escape(&book.title),
        links = nav_links
    );
    zip.start_file(format!("{}nav.xhtml", OEBPS_PREFIX), options)?;
    zip.write_all(nav.as_bytes())?;
    Ok(())
}

fn write_ncx(
    chapters: &[ChapterRecord],
    book: &BookInfo,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut nav_points = String::new();
    for (i, ch) in chapters.iter().enumerate() {
        nav_points.push_str(&format!(
            r#"    <navPoint id="navpoint-{}" playOrder="{}">
      <navLabel><text>{}</text></navLabel>
      <content src="{}"/>
    </navPoint>
"#,
            i + 1,
            i + 1,
            xml_escape(&ch.title),
            chapter_file_name(ch)
        ));
    }
    let ncx = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{}"/>
    <meta name="dtb:depth" content="1"/>
  </head>
  <docTitle>
    <text>{}</text>
  </docTitle>
  <navMap>
{}  </navMap>
</ncx>
"#,
        xml_escape(&book.identifier),
        xml_escape(&book.title),
        nav_points
    );
    zip.start_file(format!("{}toc.ncx", OEBPS_PREFIX), options)?;
    zip.write_all(ncx.as_bytes())?;
    Ok(())
}

fn write_chapters(
    chapters: &[ChapterRecord],
    book: &BookInfo,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let lang = xml_escape(&book.language);
    for ch in chapters {
        let title = xml_escape(&ch.title);
        let html = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" lang="{lang}" xml:lang="{lang}">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
</head>
<body>
<h1>{title}</h1>
<div>{body}</div>
</body>
</html>
"#,
            lang = lang,
            title = title,
            body = paragraphs_html(&ch.content)
        );
        zip.start_file(format!("{}{}", OEBPS_PREFIX, chapter_file_name(ch)), options)?;
        zip.write_all(html.as_bytes())?;
    }
    Ok(())
}

/// One `<p>` per non-blank line of normalized content.
fn paragraphs_html(content: &str) -> String {
    content
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| format!("<p>{}</p>", xml_escape(line)))
        .collect()
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::read::ZipArchive;

    fn chapters(nums: &[u32]) -> Vec<ChapterRecord> {
        nums.iter()
            .map(|n| {
                ChapterRecord::new(
                    *n,
                    format!("Chương {}: Tên {}", n, n),
                    format!("Dòng đầu {}\nDòng hai {}", n, n),
                )
            })
            .collect()
    }

    fn read_entry(zip: &mut ZipArchive<std::fs::File>, name: &str) -> String {
        let mut entry = zip.by_name(name).unwrap();
        let mut s = String::new();
        entry.read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn book_path_is_slug_dash_number() {
        let packager = EpubPackager::default();
        assert_eq!(
            packager.book_path(3),
            PathBuf::from("output/bat-dau-muoi-lien-rut-sau-do-vo-dich-3.epub")
        );
    }

    #[test]
    fn book_info_derives_identifier_and_title_from_number() {
        let info = EpubPackager::default().book_info(2);
        assert_eq!(info.identifier, "novel2");
        assert_eq!(info.title, "Bắt Đầu Mười Liên Rút Sau Đó Vô Địch - Tập 2");
        assert_eq!(info.language, "vi");
    }

    #[test]
    fn paragraphs_wrap_each_non_blank_line() {
        assert_eq!(
            paragraphs_html("A\n\nB & C\n "),
            "<p>A</p><p>B &amp; C</p>"
        );
    }

    #[test]
    fn empty_batch_is_rejected_and_nothing_written() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut packager = EpubPackager::new(&out, "slug", "Title");
        let result = packager.package(&[], 1);
        assert!(matches!(result, Err(EpubError::EmptyBatch)));
        assert!(!out.exists());
    }

    #[test]
    fn package_creates_directory_and_writes_layout() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("output");
        let mut packager = EpubPackager::new(&out, "truyen", "Truyện");
        let path = packager.package(&chapters(&[1, 2, 4]), 1).unwrap();
        assert_eq!(path, out.join("truyen-1.epub"));

        let mut zip = ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(zip.by_index(0).unwrap().name(), "mimetype");
        assert_eq!(read_entry(&mut zip, "mimetype"), "application/epub+zip");
        let names: Vec<String> = zip.file_names().map(String::from).collect();
        for expected in [
            "META-INF/container.xml",
            "OEBPS/content.opf",
            "OEBPS/nav.xhtml",
            "OEBPS/toc.ncx",
            "OEBPS/chap_1.xhtml",
            "OEBPS/chap_2.xhtml",
            "OEBPS/chap_4.xhtml",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
        assert!(!names.iter().any(|n| n == "OEBPS/chap_3.xhtml"));
    }

    #[test]
    fn opf_has_metadata_and_spine_in_batch_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut packager = EpubPackager::new(dir.path(), "s", "Truyện");
        let path = packager.package(&chapters(&[6, 7, 9]), 5).unwrap();
        let mut zip = ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        let opf = read_entry(&mut zip, "OEBPS/content.opf");
        assert!(opf.contains(r#"<dc:identifier id="book-id">novel5</dc:identifier>"#));
        assert!(opf.contains("<dc:title>Truyện - Tập 5</dc:title>"));
        assert!(opf.contains("<dc:language>vi</dc:language>"));
        assert!(opf.contains("dcterms:modified"));
        let nav = opf.find(r#"<itemref idref="nav"/>"#).unwrap();
        let c6 = opf.find(r#"<itemref idref="chap_6"/>"#).unwrap();
        let c7 = opf.find(r#"<itemref idref="chap_7"/>"#).unwrap();
        let c9 = opf.find(r#"<itemref idref="chap_9"/>"#).unwrap();
        assert!(nav < c6 && c6 < c7 && c7 < c9);
    }

    #[test]
    fn navigation_lists_every_chapter_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut packager = EpubPackager::new(dir.path(), "s", "T");
        let path = packager.package(&chapters(&[10, 11]), 1).unwrap();
        let mut zip = ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();

        let nav = read_entry(&mut zip, "OEBPS/nav.xhtml");
        let a = nav.find(r#"<a href="chap_10.xhtml">Chương 10: Tên 10</a>"#).unwrap();
        let b = nav.find(r#"<a href="chap_11.xhtml">Chương 11: Tên 11</a>"#).unwrap();
        assert!(a < b);

        let ncx = read_entry(&mut zip, "OEBPS/toc.ncx");
        assert!(ncx.contains(r#"<meta name="dtb:uid" content="novel1"/>"#));
        assert_eq!(ncx.matches("<navPoint ").count(), 2);
    }

    #[test]
    fn chapter_document_has_heading_then_paragraphs() {
        let dir = tempfile::tempdir().unwrap();
        let mut packager = EpubPackager::new(dir.path(), "s", "T");
        let record = ChapterRecord::new(3, "Chương 3: <Mở> đầu", "Một\nHai");
        let path = packager.package(&[record], 1).unwrap();
        let mut zip = ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        let doc = read_entry(&mut zip, "OEBPS/chap_3.xhtml");
        assert!(doc.contains("<h1>Chương 3: &lt;Mở&gt; đầu</h1>\n<div><p>Một</p><p>Hai</p></div>"));
    }

    #[test]
    fn repackaging_same_number_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut packager = EpubPackager::new(dir.path(), "s", "T");
        let first = packager.package(&chapters(&[1, 2]), 1).unwrap();
        let second = packager.package(&chapters(&[3]), 1).unwrap();
        assert_eq!(first, second);
        let zip = ZipArchive::new(std::fs::File::open(&second).unwrap()).unwrap();
        let names: Vec<String> = zip.file_names().map(String::from).collect();
        assert!(names.iter().any(|n| n == "OEBPS/chap_3.xhtml"));
        assert!(!names.iter().any(|n| n == "OEBPS/chap_1.xhtml"));
    }
}
