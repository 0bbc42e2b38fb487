//! Delimited row sources.
//!
//! Three header layouts show up in the ComptoxAI inputs:
//!
//! ```text
//!   FirstRow          id<TAB>name<TAB>kind          (Hetionet, DSSTox, DrugBank)
//!   Given([...])      Aop:1<TAB>Event:18<TAB>...    (AOP-Wiki exports, no header)
//!   CommentedFields   # Fields:                     (CTD dumps)
//!                     # ChemicalName,ChemicalID,...
//!                     #
//!                     Formaldehyde,D005557,...
//! ```
//!
//! Every row remembers its 1-based line in the source file. Cells are trimmed
//! and empty cells read as absent.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderMode {
    FirstRow,
    Given(Vec<String>),
    /// Header is the `#`-commented line after a `# Fields:` marker.
    CommentedFields,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub delimiter: u8,
    pub header: HeaderMode,
}

impl TableSpec {
    pub fn csv() -> Self {
        Self {
            delimiter: b',',
            header: HeaderMode::FirstRow,
        }
    }

    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            header: HeaderMode::FirstRow,
        }
    }

    /// Tab-delimited for `.tsv`, `.txt` and `.sif`; comma otherwise.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsv" | "txt" | "sif") => Self::tsv(),
            _ => Self::csv(),
        }
    }

    pub fn given<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.header = HeaderMode::Given(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn commented_fields(mut self) -> Self {
        self.header = HeaderMode::CommentedFields;
        self
    }

    fn builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .delimiter(self.delimiter)
            .flexible(true)
            .comment(Some(b'#'))
            // Hetionet and AOP-Wiki names contain bare quotes.
            .quoting(self.delimiter != b'\t');
        builder
    }
}

#[derive(Debug)]
struct Columns {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Self { names, index }
    }
}

#[derive(Debug, Clone)]
pub struct Row {
    line: usize,
    cells: Vec<String>,
    columns: Arc<Columns>,
}

impl Row {
    pub fn line(&self) -> usize {
        self.line
    }

    /// Trimmed cell under `column`; `None` when the column is unknown, the row
    /// is short, or the cell is empty.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .index
            .get(column)
            .and_then(|&i| self.at(i))
    }

    pub fn at(&self, index: usize) -> Option<&str> {
        self.cells
            .get(index)
            .map(String::as_str)
            .filter(|c| !c.is_empty())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(String::is_empty)
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    source: PathBuf,
    columns: Arc<Columns>,
    rows: Vec<Row>,
}

impl Table {
    pub fn read(path: &Path, spec: &TableSpec) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Self::from_reader(file, spec, path)
    }

    pub fn from_reader<R: Read>(reader: R, spec: &TableSpec, source: impl Into<PathBuf>) -> Result<Self> {
        let source = source.into();
        let mut reader = BufReader::new(reader);

        let (given, offset) = match &spec.header {
            HeaderMode::FirstRow => (None, 0),
            HeaderMode::Given(columns) => (Some(columns.clone()), 0),
            HeaderMode::CommentedFields => {
                let (columns, consumed) = scan_commented_header(&mut reader, spec.delimiter)
                    .with_context(|| format!("{}: reading commented header", source.display()))?;
                (Some(columns), consumed)
            }
        };

        let mut csv = spec
            .builder()
            .has_headers(given.is_none())
            .from_reader(reader);
        let names = match given {
            Some(names) => names,
            None => csv
                .headers()
                .with_context(|| format!("{}: reading header row", source.display()))?
                .iter()
                .map(|h| h.trim().to_string())
                .collect(),
        };
        let columns = Arc::new(Columns::new(names));

        let mut rows = Vec::new();
        for record in csv.records() {
            let record = record.with_context(|| format!("{}: malformed row", source.display()))?;
            let line = record.position().map_or(0, |p| p.line() as usize) + offset;
            let cells: Vec<String> = record.iter().map(|c| c.trim().to_string()).collect();
            let row = Row {
                line,
                cells,
                columns: Arc::clone(&columns),
            };
            if !row.is_empty() {
                rows.push(row);
            }
        }

        tracing::debug!(source = %source.display(), rows = rows.len(), "table loaded");
        Ok(Self {
            source,
            columns,
            rows,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn columns(&self) -> &[String] {
        &self.columns.names
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fail unless every named column is present in the header.
    pub fn require_columns(&self, required: &[&str]) -> Result<()> {
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|c| !self.columns.index.contains_key(*c))
            .collect();
        if !missing.is_empty() {
            bail!(
                "{}: missing column(s) {}",
                self.source.display(),
                missing.join(", ")
            );
        }
        Ok(())
    }
}

/// Consume lines up to and including the commented header; returns the
/// column names and the number of lines consumed.
fn scan_commented_header<R: BufRead>(reader: &mut R, delimiter: u8) -> Result<(Vec<String>, usize)> {
    let mut consumed = 0;
    let mut line = String::new();
    let mut after_marker = false;
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            bail!("no `# Fields:` header before end of input");
        }
        consumed += 1;
        let Some(body) = line.trim().strip_prefix('#') else {
            bail!("data on line {consumed} before the `# Fields:` header");
        };
        let body = body.trim_start_matches('#').trim();
        if after_marker {
            return Ok((split_header(body, delimiter)?, consumed));
        }
        after_marker = body == "Fields:";
    }
}

fn split_header(line: &str, delimiter: u8) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(|c| c.trim().to_string()).collect()),
        None => bail!("empty header after `# Fields:`"),
    }
}
