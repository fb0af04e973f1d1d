use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::crawler::errors::{ArchiveError, CrawlerResult, MergeError};
use crate::crawler::file_manager::Workspace;
use crate::crawler::logging::ArchiveLogger;

/// Concatenates page documents into one output document
pub trait DocumentMerger {
    /// Queue a document; a failure leaves the merger usable
    fn append(&mut self, path: &Path) -> CrawlerResult<()>;
    /// Write everything appended so far, in append order
    fn write(&mut self, output: &Path) -> CrawlerResult<()>;
}

/// `lopdf` backed merger
#[derive(Default)]
pub struct PdfMerger {
    documents: Vec<Document>,
}

impl PdfMerger {
    pub fn new() -> Self {
        Self::default()
    }

    fn merged_document(&mut self) -> CrawlerResult<Document> {
        if self.documents.is_empty() {
            return Err(MergeError::NothingAppended.into());
        }

        let mut max_id = 1;
        let mut roots: Option<(ObjectId, ObjectId)> = None;
        let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
        let mut objects: Vec<(ObjectId, Object)> = Vec::new();

        for mut doc in self.documents.drain(..) {
            doc.renumber_objects_with(max_id);
            max_id = doc.max_id + 1;

            if roots.is_none() {
                roots = Some(root_ids(&doc)?);
            }
            // get_pages is keyed by page number, so this keeps page order
            for page_id in doc.get_pages().into_values() {
                pages.push((page_id, page_with_inherited(&doc, page_id)?));
            }
            objects.extend(doc.objects);
        }

        let (catalog_id, pages_id) = roots
            .ok_or_else(|| MergeError::MalformedDocument("no catalog found".to_string()))?;

        let mut merged = Document::with_version("1.5");
        let mut catalog_object: Option<Object> = None;
        let mut pages_object: Option<Object> = None;

        for (object_id, object) in objects {
            if object_id == catalog_id {
                catalog_object = Some(object);
                continue;
            }
            if object_id == pages_id {
                pages_object = Some(object);
                continue;
            }
            // every page is re-parented onto the first document's root node;
            // other trees and outlines would point at dropped objects
            let replaced = matches!(
                type_name(&object),
                Some(b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline")
            );
            if !replaced {
                merged.objects.insert(object_id, object);
            }
        }

        let malformed = |e: lopdf::Error| MergeError::MalformedDocument(e.to_string());
        let catalog_object = catalog_object
            .ok_or_else(|| MergeError::MalformedDocument("no catalog found".to_string()))?;
        let pages_object = pages_object
            .ok_or_else(|| MergeError::MalformedDocument("no page tree found".to_string()))?;

        let page_count = pages.len();
        let mut kids = Vec::with_capacity(page_count);
        for (page_id, mut page) in pages {
            page.set("Parent", Object::Reference(pages_id));
            merged.objects.insert(page_id, Object::Dictionary(page));
            kids.push(Object::Reference(page_id));
        }

        let mut pages_dictionary = pages_object.as_dict().map_err(malformed)?.clone();
        pages_dictionary.remove(b"Parent");
        pages_dictionary.set("Count", Object::Integer(kids.len() as i64));
        pages_dictionary.set("Kids", Object::Array(kids));
        merged
            .objects
            .insert(pages_id, Object::Dictionary(pages_dictionary));

        let mut catalog_dictionary = catalog_object.as_dict().map_err(malformed)?.clone();
        catalog_dictionary.set("Pages", Object::Reference(pages_id));
        catalog_dictionary.remove(b"Outlines");
        merged
            .objects
            .insert(catalog_id, Object::Dictionary(catalog_dictionary));

        merged.trailer.set("Root", Object::Reference(catalog_id));
        merged.max_id = merged.objects.keys().map(|(id, _)| *id).max().unwrap_or(0);
        merged.renumber_objects();
        merged.adjust_zero_pages();
        merged.compress();

        debug!("Merged {} page(s)", page_count);
        Ok(merged)
    }
}

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Catalog and root page-tree node of a document
fn root_ids(doc: &Document) -> CrawlerResult<(ObjectId, ObjectId)> {
    let malformed = |e: lopdf::Error| MergeError::MalformedDocument(e.to_string());
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(malformed)?;
    let pages_id = doc
        .catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(malformed)?;
    Ok((catalog_id, pages_id))
}

/// A page dictionary with the attributes it inherits copied in, so it can be
/// moved under a different parent.
fn page_with_inherited(doc: &Document, page_id: ObjectId) -> CrawlerResult<Dictionary> {
    let mut page = doc
        .get_dictionary(page_id)
        .map_err(|e| MergeError::MalformedDocument(e.to_string()))?
        .clone();

    let mut visited = HashSet::new();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    while let Some(parent_id) = parent {
        if !visited.insert(parent_id) {
            break;
        }
        let Ok(node) = doc.get_dictionary(parent_id) else {
            break;
        };
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key, value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Ok(page)
}

fn type_name(object: &Object) -> Option<&[u8]> {
    object
        .as_dict()
        .ok()
        .and_then(|dictionary| dictionary.get(b"Type").ok())
        .and_then(|name| name.as_name().ok())
}

impl DocumentMerger for PdfMerger {
    fn append(&mut self, path: &Path) -> CrawlerResult<()> {
        let document = Document::load(path).map_err(|e| MergeError::AppendFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        if document.get_pages().is_empty() {
            return Err(MergeError::AppendFailed {
                path: path.display().to_string(),
                reason: "document has no pages".to_string(),
            }
            .into());
        }
        self.documents.push(document);
        Ok(())
    }

    fn write(&mut self, output: &Path) -> CrawlerResult<()> {
        let write_failed = |reason: String| MergeError::WriteFailed {
            path: output.display().to_string(),
            reason,
        };
        let mut merged = self.merged_document()?;
        merged
            .save(output)
            .map_err(|e| write_failed(e.to_string()))?;
        Ok(())
    }
}

/// What the merge step did
#[derive(Debug)]
pub enum MergeOutcome {
    /// The record was empty; nothing was written or deleted
    NothingToMerge,
    /// The archive was written and intermediates cleaned up (best effort)
    Merged {
        output: PathBuf,
        merged: usize,
        skipped: Vec<(PathBuf, ArchiveError)>,
        cleanup_failures: Vec<ArchiveError>,
    },
    /// The archive could not be written; intermediates are untouched
    WriteFailed(ArchiveError),
}

/// Merge the recorded documents in record order into the workspace archive,
/// then delete the intermediates and the working directory.
pub fn merge_documents(
    merger: &mut dyn DocumentMerger,
    record: &[(String, PathBuf)],
    workspace: &Workspace,
    logger: &mut ArchiveLogger,
) -> MergeOutcome {
    if record.is_empty() {
        info!("No PDFs to merge.");
        return MergeOutcome::NothingToMerge;
    }

    logger.start_operation("merge");
    info!("Merging {} PDF(s)...", record.len());

    let mut skipped = Vec::new();
    let mut merged = 0;
    for (url, path) in record {
        match merger.append(path) {
            Ok(()) => {
                merged += 1;
                debug!("Added: {} ({})", path.display(), url);
            }
            Err(e) => {
                warn!("Error adding {}: {}", path.display(), e);
                skipped.push((path.clone(), e));
            }
        }
    }

    let output = workspace.archive_path();
    if let Err(e) = merger.write(&output) {
        error!("Error saving merged PDF: {}", e);
        let reason = e.to_string();
        logger.log_file_operation("merge", &output.display().to_string(), false, Some(&reason));
        logger.end_operation("merge", false);
        return MergeOutcome::WriteFailed(e);
    }
    logger.log_file_operation("merge", &output.display().to_string(), true, None);

    let mut cleanup_failures = Vec::new();
    for (_, path) in record {
        match workspace.remove_document(path) {
            Ok(()) => debug!("Deleted: {}", path.display()),
            Err(e) => {
                let reason = e.to_string();
                let target = path.display().to_string();
                logger.log_file_operation("delete", &target, false, Some(&reason));
                cleanup_failures.push(e);
            }
        }
    }
    if let Err(e) = workspace.remove_working_dir() {
        logger.log_file_operation(
            "remove_dir",
            &workspace.working_dir().display().to_string(),
            false,
            Some(&e.to_string()),
        );
        cleanup_failures.push(e);
    }

    logger.end_operation("merge", true);
    MergeOutcome::Merged {
        output,
        merged,
        skipped,
        cleanup_failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};
    use std::fs;
    use tempfile::TempDir;

    /// Write a PDF whose pages carry a `Label` entry so order can be checked
    fn write_pdf(path: &Path, labels: &[&str]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for label in labels {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Label" => Object::string_literal(*label),
            });
            kids.push(Object::Reference(page_id));
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    /// Two-level page tree: the root node has a higher id than the
    /// intermediate node, which carries the MediaBox its pages inherit.
    fn write_nested_pdf(path: &Path, labels: &[&str]) {
        let mut doc = Document::with_version("1.5");
        let node_id = doc.new_object_id();
        let root_id = doc.new_object_id();
        let mut kids = Vec::new();
        for label in labels {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => node_id,
                "Contents" => content_id,
                "Label" => Object::string_literal(*label),
            });
            kids.push(Object::Reference(page_id));
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            node_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Parent" => root_id,
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        doc.objects.insert(
            root_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(node_id)],
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => root_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    fn page_labels(path: &Path) -> Vec<String> {
        let doc = Document::load(path).unwrap();
        doc.get_pages()
            .into_values()
            .map(|id| {
                let page = doc.get_dictionary(id).unwrap();
                let label = page.get(b"Label").unwrap().as_str().unwrap();
                String::from_utf8_lossy(label).to_string()
            })
            .collect()
    }

    #[test]
    fn test_pdf_merger_keeps_append_order() {
        let temp_dir = TempDir::new().unwrap();
        let b = temp_dir.path().join("b.pdf");
        let a = temp_dir.path().join("a.pdf");
        write_pdf(&b, &["b1", "b2"]);
        write_pdf(&a, &["a1"]);

        let mut merger = PdfMerger::new();
        merger.append(&b).unwrap();
        merger.append(&a).unwrap();
        let output = temp_dir.path().join("out.pdf");
        merger.write(&output).unwrap();

        assert_eq!(page_labels(&output), vec!["b1", "b2", "a1"]);
    }

    #[test]
    fn test_pdf_merger_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let garbage = temp_dir.path().join("garbage.pdf");
        fs::write(&garbage, b"this is not a pdf").unwrap();

        let mut merger = PdfMerger::new();
        let err = merger.append(&garbage).unwrap_err();
        assert!(matches!(err, ArchiveError::Merge(MergeError::AppendFailed { .. })));
        assert!(merger.append(&temp_dir.path().join("missing.pdf")).is_err());
    }

    #[test]
    fn test_pdf_merger_write_without_documents() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out.pdf");
        let err = PdfMerger::new().write(&output).unwrap_err();
        assert!(matches!(err, ArchiveError::Merge(MergeError::NothingAppended)));
        assert!(!output.exists());
    }

    #[test]
    fn test_merge_documents_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::new(temp_dir.path(), "ex.test");
        workspace.create().unwrap();

        let first = workspace.page_path("https://ex.test/a");
        let broken = workspace.page_path("https://ex.test/broken");
        let second = workspace.page_path("https://ex.test/b");
        write_pdf(&first, &["a"]);
        fs::write(&broken, b"not a pdf").unwrap();
        write_pdf(&second, &["b"]);

        let record = vec![
            ("https://ex.test/a".to_string(), first.clone()),
            ("https://ex.test/broken".to_string(), broken.clone()),
            ("https://ex.test/b".to_string(), second.clone()),
        ];
        let mut logger = ArchiveLogger::new();
        let outcome = merge_documents(&mut PdfMerger::new(), &record, &workspace, &mut logger);

        match outcome {
            MergeOutcome::Merged {
                output,
                merged,
                skipped,
                cleanup_failures,
            } => {
                assert_eq!(output, workspace.archive_path());
                assert_eq!(merged, 2);
                assert_eq!(skipped.len(), 1);
                assert_eq!(skipped[0].0, broken);
                assert!(cleanup_failures.is_empty());
                assert_eq!(page_labels(&output), vec!["a", "b"]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!first.exists());
        assert!(!broken.exists());
        assert!(!workspace.working_dir().exists());
    }

    #[test]
    fn test_merge_documents_empty_record() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::new(temp_dir.path(), "ex.test");
        workspace.create().unwrap();

        let mut logger = ArchiveLogger::new();
        let outcome = merge_documents(&mut PdfMerger::new(), &[], &workspace, &mut logger);
        assert!(matches!(outcome, MergeOutcome::NothingToMerge));
        assert!(workspace.working_dir().exists());
        assert!(!workspace.archive_path().exists());
    }

    #[test]
    fn test_merge_documents_write_failure_preserves_intermediates() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::new(temp_dir.path(), "ex.test");
        workspace.create().unwrap();

        let page = workspace.page_path("https://ex.test/a");
        fs::write(&page, b"not a pdf").unwrap();
        let record = vec![("https://ex.test/a".to_string(), page.clone())];

        let mut logger = ArchiveLogger::new();
        let outcome = merge_documents(&mut PdfMerger::new(), &record, &workspace, &mut logger);
        assert!(matches!(outcome, MergeOutcome::WriteFailed(_)));
        assert!(page.exists());
        assert!(workspace.working_dir().exists());
        assert!(!workspace.archive_path().exists());
    }

    #[test]
    fn test_pdf_merger_flattens_nested_page_trees() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested.pdf");
        let flat = temp_dir.path().join("flat.pdf");
        write_nested_pdf(&nested, &["n1", "n2"]);
        write_pdf(&flat, &["f1"]);

        let mut merger = PdfMerger::new();
        merger.append(&nested).unwrap();
        merger.append(&flat).unwrap();
        let output = temp_dir.path().join("out.pdf");
        merger.write(&output).unwrap();

        assert_eq!(page_labels(&output), vec!["n1", "n2", "f1"]);

        let doc = Document::load(&output).unwrap();
        let root_id = doc
            .catalog()
            .unwrap()
            .get(b"Pages")
            .unwrap()
            .as_reference()
            .unwrap();
        let root = doc.get_dictionary(root_id).unwrap();
        assert!(!root.has(b"Parent"));
        assert_eq!(root.get(b"Count").unwrap().as_i64().unwrap(), 3);
        assert_eq!(root.get(b"Kids").unwrap().as_array().unwrap().len(), 3);

        for page_id in doc.get_pages().into_values() {
            let page = doc.get_dictionary(page_id).unwrap();
            assert_eq!(page.get(b"Parent").unwrap().as_reference().unwrap(), root_id);
            assert!(page.has(b"MediaBox"));
        }
    }
}
