//! Hand-off of rendered comment bodies
//!
//! Posting to a hosting platform happens outside this crate. A `CommentSink`
//! receives the comment bodies in posting order; the bundled sinks write them
//! to a stream or to one file per comment for a later workflow step to post.

use crate::Result;
use crate::report::ReportFormat;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Which comment a body belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    AddedFiles,
    ModifiedFiles,
    Summary,
}

impl CommentKind {
    /// File stem used when comments are saved to disk
    pub fn file_stem(&self) -> &'static str {
        match self {
            CommentKind::AddedFiles => "added-files",
            CommentKind::ModifiedFiles => "modified-files",
            CommentKind::Summary => "summary",
        }
    }
}

/// One comment ready to post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub kind: CommentKind,
    pub body: String,
}

impl Comment {
    pub fn new(kind: CommentKind, body: impl Into<String>) -> Self {
        Self {
            kind,
            body: body.into(),
        }
    }
}

/// Receiver of rendered comments
pub trait CommentSink {
    fn post(&mut self, comment: &Comment) -> Result<()>;

    /// Post several comments in order, stopping at the first failure
    fn post_all(&mut self, comments: &[Comment]) -> Result<()> {
        for comment in comments {
            self.post(comment)?;
        }
        Ok(())
    }
}

/// Writes comments to a stream, separated by a blank line
pub struct WriterSink<W: Write> {
    writer: W,
    posted: usize,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, posted: 0 }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> CommentSink for WriterSink<W> {
    fn post(&mut self, comment: &Comment) -> Result<()> {
        if self.posted > 0 {
            writeln!(self.writer)?;
        }
        self.writer.write_all(comment.body.as_bytes())?;
        if !comment.body.ends_with('\n') {
            writeln!(self.writer)?;
        }
        self.writer.flush()?;
        self.posted += 1;
        Ok(())
    }
}

/// Writes each comment to `<dir>/<kind>.<ext>`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    extension: &'static str,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    /// Create the directory if needed
    pub fn create<P: AsRef<Path>>(dir: P, format: ReportFormat) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            extension: format.extension(),
            written: Vec::new(),
        })
    }

    /// Files written so far
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl CommentSink for DirectorySink {
    fn post(&mut self, comment: &Comment) -> Result<()> {
        let path = self
            .dir
            .join(format!("{}.{}", comment.kind.file_stem(), self.extension));
        fs::write(&path, &comment.body)?;
        log::info!("Wrote {}", path.display());
        self.written.push(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writer_sink() {
        let mut sink = WriterSink::new(Vec::new());
        sink.post_all(&[
            Comment::new(CommentKind::AddedFiles, "| Added Files | Coverage |\n"),
            Comment::new(CommentKind::Summary, "done"),
        ])
        .unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(output, "| Added Files | Coverage |\n\ndone\n");
    }

    #[test]
    fn test_directory_sink() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("comments");
        let mut sink = DirectorySink::create(&out, ReportFormat::Markdown).unwrap();

        sink.post(&Comment::new(CommentKind::ModifiedFiles, "table"))
            .unwrap();

        let path = out.join("modified-files.md");
        assert_eq!(sink.written(), &[path.clone()]);
        assert_eq!(fs::read_to_string(path).unwrap(), "table");
    }
}
