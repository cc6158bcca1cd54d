//! Source extraction: PDF pages, OCR'd images and webpages into documents

use std::path::Path;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::{HttpFetcher, OcrProvider, PageFetcher, TesseractOcr};
use crate::types::{Document, DocumentMetadata, SourceKind};

use super::html::visible_text;

/// Turns a source string (path or URL) into documents
pub struct Extractor {
    ocr: Arc<dyn OcrProvider>,
    fetcher: Arc<dyn PageFetcher>,
}

impl Extractor {
    pub fn new(ocr: Arc<dyn OcrProvider>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { ocr, fetcher }
    }

    /// Build with tesseract OCR and the HTTP fetcher from configuration
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(TesseractOcr::new(config.ocr.clone())),
            Arc::new(HttpFetcher::new(&config.fetch)?),
        ))
    }

    /// Extract documents from a single source
    ///
    /// PDFs yield one document per page with text; images and webpages yield one
    /// document. Failures are logged before being returned.
    pub async fn extract(&self, source: &str) -> Result<Vec<Document>> {
        let result = match SourceKind::detect(source) {
            Ok(kind) => {
                tracing::debug!("Extracting {} source {}", kind.display_name(), source);
                match kind {
                    SourceKind::Pdf(path) => self.extract_pdf(source, &path).await,
                    SourceKind::Image(path) => self.extract_image(source, &path).await,
                    SourceKind::Webpage(url) => self.extract_webpage(&url).await,
                }
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(docs) => tracing::info!("Extracted {} document(s) from {}", docs.len(), source),
            Err(e) => tracing::error!("Error processing {}: {}", source, e),
        }
        result
    }

    /// Extract every source in order, stopping at the first failure
    pub async fn extract_all(&self, sources: &[String]) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for source in sources {
            documents.extend(self.extract(source).await?);
        }
        Ok(documents)
    }

    async fn extract_pdf(&self, source: &str, path: &Path) -> Result<Vec<Document>> {
        let data = tokio::fs::read(path).await.map_err(|e| Error::Pdf {
            source_id: source.to_string(),
            message: e.to_string(),
        })?;

        let owned_source = source.to_string();
        let pages = tokio::task::spawn_blocking(move || read_pdf_pages(&owned_source, &data))
            .await
            .map_err(|e| Error::internal(format!("PDF task failed: {}", e)))??;

        let (documents, omitted) = pdf_documents(source, pages)?;
        if omitted > 0 {
            tracing::info!("Omitted {} scanned page(s) from {}", omitted, source);
        }
        Ok(documents)
    }

    async fn extract_image(&self, source: &str, path: &Path) -> Result<Vec<Document>> {
        let data = tokio::fs::read(path).await.map_err(|e| Error::ocr(source, e.to_string()))?;

        let text = self.ocr.recognize(&data).await.map_err(|e| match e {
            Error::Ocr { message, .. } => Error::ocr(source, message),
            other @ (Error::Timeout { .. } | Error::Io(_)) => Error::ocr(source, other.to_string()),
            other => other,
        })?;

        if text.trim().is_empty() {
            return Err(Error::NoTextExtracted {
                source_id: source.to_string(),
            });
        }

        Ok(vec![Document::new(text, DocumentMetadata::new(source))])
    }

    async fn extract_webpage(&self, url: &str) -> Result<Vec<Document>> {
        let page = self.fetcher.fetch(url).await?;
        if !page.is_success() {
            return Err(Error::fetch(url, format!("HTTP {}", page.status)));
        }

        let text = visible_text(&page.body);
        if text.trim().is_empty() {
            return Err(Error::NoVisibleText {
                url: url.to_string(),
            });
        }

        Ok(vec![Document::new(text, DocumentMetadata::new(url))])
    }
}

/// Decode a PDF and return the text of each page in page order
///
/// Pages whose text cannot be decoded come back empty and count as scanned.
fn read_pdf_pages(source: &str, data: &[u8]) -> Result<Vec<(u32, String)>> {
    let doc = lopdf::Document::load_mem(data).map_err(|e| Error::Pdf {
        source_id: source.to_string(),
        message: e.to_string(),
    })?;

    let pages = doc
        .get_pages()
        .into_keys()
        .map(|page_num| {
            let text = doc.extract_text(&[page_num]).unwrap_or_else(|e| {
                tracing::warn!("Could not decode page {} of {}: {}", page_num, source, e);
                String::new()
            });
            (page_num, text)
        })
        .collect();

    Ok(pages)
}

/// Keep pages with text as documents and count the rest
///
/// Returns `AllPagesScanned` when no page has text.
fn pdf_documents(source: &str, pages: Vec<(u32, String)>) -> Result<(Vec<Document>, usize)> {
    let total = pages.len();
    let documents: Vec<Document> = pages
        .into_iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(page, text)| Document::new(text, DocumentMetadata::page(source, page)))
        .collect();

    if documents.is_empty() {
        return Err(Error::AllPagesScanned {
            source_id: source.to_string(),
        });
    }

    let omitted = total - documents.len();
    Ok((documents, omitted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::FetchedPage;
    use async_trait::async_trait;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use std::io::Write;
    use std::sync::Mutex;

    struct FakeOcr(String);

    #[async_trait]
    impl OcrProvider for FakeOcr {
        async fn recognize(&self, _image: &[u8]) -> Result<String> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    struct FakeFetcher(FetchedPage);

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchedPage> {
            Ok(self.0.clone())
        }
    }

    fn extractor(ocr_text: &str, status: u16, body: &str) -> Extractor {
        Extractor::new(
            Arc::new(FakeOcr(ocr_text.to_string())),
            Arc::new(FakeFetcher(FetchedPage {
                status,
                body: body.to_string(),
            })),
        )
    }

    struct StalledOcr;

    #[async_trait]
    impl OcrProvider for StalledOcr {
        async fn recognize(&self, _image: &[u8]) -> Result<String> {
            Err(Error::Timeout {
                operation: "tesseract".to_string(),
                secs: 60,
            })
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    /// Captures formatted log output
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    /// Write a PDF with one page per entry; an empty entry gets an empty content stream
    fn pdf_file(pages: &[&str]) -> tempfile::NamedTempFile {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let operations = if text.is_empty() {
                Vec::new()
            } else {
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ]
            };
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        doc.save(file.path()).unwrap();
        file
    }

    fn image_file(suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(b"not really an image").unwrap();
        file
    }

    #[test]
    fn test_pdf_scanned_pages_are_omitted() {
        let pages = vec![
            (1, "Intro".to_string()),
            (2, "   ".to_string()),
            (3, "Policy".to_string()),
        ];

        let (docs, omitted) = pdf_documents("handbook.pdf", pages).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(omitted, 1);
        assert_eq!(docs[0].metadata.page, Some(1));
        assert_eq!(docs[1].metadata.page, Some(3));
        assert_eq!(docs[1].text, "Policy");
    }

    #[test]
    fn test_pdf_all_pages_scanned() {
        let pages = vec![(1, String::new()), (2, "\n".to_string())];
        assert!(matches!(
            pdf_documents("scan.pdf", pages),
            Err(Error::AllPagesScanned { .. })
        ));
    }

    #[tokio::test]
    async fn test_pdf_with_scanned_middle_page() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let file = pdf_file(&["Leave policy", "", "Expense policy"]);
        let source = file.path().to_string_lossy().to_string();

        let docs = extractor("", 200, "").extract(&source).await.unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.page, Some(1));
        assert_eq!(docs[1].metadata.page, Some(3));
        assert!(docs[0].text.contains("Leave policy"));
        assert!(docs[1].text.contains("Expense policy"));
        assert!(docs.iter().all(|d| d.metadata.source == source));
        assert!(logs.contents().contains("Omitted 1 scanned page(s)"));
    }

    #[tokio::test]
    async fn test_pdf_with_only_empty_pages() {
        let file = pdf_file(&["", ""]);
        let source = file.path().to_string_lossy().to_string();

        let err = extractor("", 200, "").extract(&source).await.unwrap_err();
        assert!(matches!(err, Error::AllPagesScanned { ref source_id } if *source_id == source));
    }

    #[test]
    fn test_invalid_pdf_bytes() {
        assert!(matches!(
            read_pdf_pages("broken.pdf", b"not a pdf"),
            Err(Error::Pdf { .. })
        ));
    }

    #[tokio::test]
    async fn test_unsupported_source() {
        let err = extractor("", 200, "").extract("notes.docx").await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedSource(_)));
    }

    #[tokio::test]
    async fn test_image_with_text() {
        let file = image_file(".png");
        let source = file.path().to_string_lossy().to_string();

        let docs = extractor("Annual leave: 20 days", 200, "")
            .extract(&source)
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "Annual leave: 20 days");
        assert_eq!(docs[0].metadata.source, source);
        assert_eq!(docs[0].metadata.page, None);
    }

    #[tokio::test]
    async fn test_image_without_text() {
        let file = image_file(".JPG");
        let source = file.path().to_string_lossy().to_string();

        let err = extractor(" \n\t", 200, "").extract(&source).await.unwrap_err();
        assert!(matches!(err, Error::NoTextExtracted { .. }));
    }

    #[tokio::test]
    async fn test_ocr_timeout_names_the_image() {
        let file = image_file(".png");
        let source = file.path().to_string_lossy().to_string();
        let ex = Extractor::new(
            Arc::new(StalledOcr),
            Arc::new(FakeFetcher(FetchedPage {
                status: 200,
                body: String::new(),
            })),
        );

        let err = ex.extract(&source).await.unwrap_err();
        match err {
            Error::Ocr { source_id, message } => {
                assert_eq!(source_id, source);
                assert!(message.contains("timed out"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_webpage_visible_text() {
        let html = "<html><body><h1>Benefits</h1><script>x()</script></body></html>";
        let docs = extractor("", 200, html)
            .extract("https://example.com/benefits")
            .await
            .unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "Benefits");
        assert_eq!(docs[0].metadata.source, "https://example.com/benefits");
    }

    #[tokio::test]
    async fn test_webpage_failures() {
        let err = extractor("", 404, "missing")
            .extract("https://example.com/404")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));

        let err = extractor("", 200, "<html><body> </body></html>")
            .extract("https://example.com/empty")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoVisibleText { .. }));
    }

    #[tokio::test]
    async fn test_extract_all_stops_at_first_failure() {
        let ex = extractor("", 200, "<p>Hello</p>");
        let sources = vec![
            "https://example.com/a".to_string(),
            "archive.zip".to_string(),
        ];
        assert!(ex.extract_all(&sources).await.is_err());

        let docs = ex.extract_all(&sources[..1]).await.unwrap();
        assert_eq!(docs.len(), 1);
    }
}
