use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor: Send + Sync {
    /// Structured extraction: one entry per page that has non-blank text, in page order.
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;

    /// Permissive page-by-page extraction. Never fails; unreadable input yields `""`.
    fn extract_fallback_text(&self, path: &Path) -> String;
}

/// Low-level view of a loaded PDF used by the fallback walk.
pub trait PageSource {
    fn is_encrypted(&self) -> bool;
    fn decrypt(&mut self, password: &str) -> Result<(), String>;
    fn page_numbers(&self) -> Vec<u32>;
    fn page_text(&self, page: u32) -> Result<String, String>;
}

impl PageSource for Document {
    fn is_encrypted(&self) -> bool {
        Document::is_encrypted(self)
    }

    fn decrypt(&mut self, password: &str) -> Result<(), String> {
        Document::decrypt(self, password).map_err(|error| error.to_string())
    }

    fn page_numbers(&self) -> Vec<u32> {
        self.get_pages().keys().copied().collect()
    }

    fn page_text(&self, page: u32) -> Result<String, String> {
        self.extract_text(&[page]).map_err(|error| error.to_string())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            let normalized = normalize_page_text(&text);
            if !normalized.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text: normalized,
                });
            }
        }

        debug!(path = %path.display(), pages = pages.len(), "structured extraction finished");
        Ok(pages)
    }

    fn extract_fallback_text(&self, path: &Path) -> String {
        match Document::load(path) {
            Ok(mut document) => read_all_pages(&mut document),
            Err(error) => {
                warn!(path = %path.display(), %error, "fallback extraction could not load pdf");
                String::new()
            }
        }
    }
}

/// Walks every page of `source`, decrypting with the empty password first when needed.
/// Pages that fail to extract contribute an empty line.
pub fn read_all_pages<S: PageSource>(source: &mut S) -> String {
    if source.is_encrypted() {
        if let Err(error) = source.decrypt("") {
            warn!(%error, "empty-password decryption failed; extracting anyway");
        }
    }

    source
        .page_numbers()
        .into_iter()
        .map(|page| {
            source.page_text(page).unwrap_or_else(|error| {
                debug!(page, %error, "page skipped during fallback extraction");
                String::new()
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapses horizontal whitespace per line and squeezes blank-line runs into one paragraph break.
pub fn normalize_page_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut pending_break = false;

    for line in text.lines() {
        let collapsed = line
            .split(|c: char| c.is_whitespace() || c == '\u{a0}')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if collapsed.is_empty() {
            pending_break = true;
            continue;
        }

        if !normalized.is_empty() {
            normalized.push_str(if pending_break { "\n\n" } else { "\n" });
        }
        normalized.push_str(&collapsed);
        pending_break = false;
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{blank_pdf, text_pdf};
    use std::cell::RefCell;
    use tempfile::tempdir;

    struct FakeSource {
        encrypted: bool,
        locked: bool,
        pages: Vec<Result<String, String>>,
        decrypt_calls: RefCell<Vec<String>>,
    }

    impl FakeSource {
        fn new(encrypted: bool, pages: Vec<Result<String, String>>) -> Self {
            Self {
                encrypted,
                locked: encrypted,
                pages,
                decrypt_calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl PageSource for FakeSource {
        fn is_encrypted(&self) -> bool {
            self.encrypted
        }

        fn decrypt(&mut self, password: &str) -> Result<(), String> {
            self.decrypt_calls.borrow_mut().push(password.to_string());
            if password.is_empty() {
                self.locked = false;
                Ok(())
            } else {
                Err("wrong password".to_string())
            }
        }

        fn page_numbers(&self) -> Vec<u32> {
            (1..=self.pages.len() as u32).collect()
        }

        fn page_text(&self, page: u32) -> Result<String, String> {
            if self.locked {
                return Err("document is encrypted".to_string());
            }
            self.pages[(page - 1) as usize].clone()
        }
    }

    #[test]
    fn fallback_joins_pages_with_newlines() {
        let mut source = FakeSource::new(
            false,
            vec![Ok("Page 1 text".to_string()), Ok("Page 2 text".to_string())],
        );

        assert_eq!(read_all_pages(&mut source), "Page 1 text\nPage 2 text");
        assert!(source.decrypt_calls.borrow().is_empty());
    }

    #[test]
    fn fallback_decrypts_with_empty_password() {
        let mut source = FakeSource::new(true, vec![Ok("Decrypted text".to_string())]);

        let text = read_all_pages(&mut source);

        assert_eq!(text, "Decrypted text");
        assert_eq!(source.decrypt_calls.borrow().as_slice(), [String::new()]);
    }

    #[test]
    fn fallback_tolerates_failing_pages() {
        let mut source = FakeSource::new(
            false,
            vec![Err("bad content stream".to_string()), Ok("kept".to_string())],
        );

        assert_eq!(read_all_pages(&mut source), "\nkept");
    }

    #[test]
    fn fallback_on_unreadable_file_is_empty() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%broken")?;

        assert_eq!(LopdfExtractor.extract_fallback_text(&path), "");
        assert_eq!(
            LopdfExtractor.extract_fallback_text(&dir.path().join("missing.pdf")),
            ""
        );
        Ok(())
    }

    #[test]
    fn structured_extraction_rejects_garbage() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all")?;

        assert!(matches!(
            LopdfExtractor.extract_pages(&path),
            Err(IngestError::PdfParse(_))
        ));
        Ok(())
    }

    #[test]
    fn structured_extraction_reads_page_text() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("hello.pdf");
        text_pdf(&path, &["Hello World!", "Second page"])?;

        let pages = LopdfExtractor.extract_pages(&path)?;

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert!(pages[0].text.contains("Hello World!"));
        assert!(pages[1].text.contains("Second page"));
        Ok(())
    }

    #[test]
    fn structured_extraction_drops_blank_pages() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("blank.pdf");
        blank_pdf(&path)?;

        assert!(LopdfExtractor.extract_pages(&path)?.is_empty());
        Ok(())
    }

    #[test]
    fn page_text_is_normalized() {
        let raw = "  Total\u{a0}\u{a0}due:\t 42  \n\n\n\nNext   line\nsame paragraph  \n";
        assert_eq!(
            normalize_page_text(raw),
            "Total due: 42\n\nNext line\nsame paragraph"
        );
    }
}
