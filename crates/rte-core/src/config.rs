use serde::{Deserialize, Serialize};

use crate::tags;

const DEFAULT_MAX_UNDO: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub paragraph_tag: String,
    pub table: TableDefaults,
    pub list: ListConfig,
    pub paste: PasteRules,
    pub max_undo: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            paragraph_tag: tags::PARAGRAPH.to_string(),
            table: TableDefaults::default(),
            list: ListConfig::default(),
            paste: PasteRules::default(),
            max_undo: DEFAULT_MAX_UNDO,
        }
    }
}

impl EditorConfig {
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(s).map(Self::with_defaults)
    }

    fn with_defaults(mut self) -> Self {
        if self.paragraph_tag.trim().is_empty() {
            self.paragraph_tag = tags::PARAGRAPH.to_string();
        }
        if self.max_undo == 0 {
            self.max_undo = DEFAULT_MAX_UNDO;
        }
        if self.table.max_rows == 0 {
            self.table.max_rows = TableDefaults::default().max_rows;
        }
        if self.table.max_cols == 0 {
            self.table.max_cols = TableDefaults::default().max_cols;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableDefaults {
    /// Header placement used when `createtable` does not name one.
    pub header: String,
    pub border: Option<String>,
    pub cellpadding: Option<String>,
    pub cellspacing: Option<String>,
    /// Insert an empty paragraph after a new table that would otherwise be
    /// the last block of the document.
    pub trailing_paragraph: bool,
    pub max_rows: usize,
    pub max_cols: usize,
}

impl Default for TableDefaults {
    fn default() -> Self {
        Self {
            header: String::new(),
            border: Some("1".to_string()),
            cellpadding: None,
            cellspacing: None,
            trailing_paragraph: true,
            max_rows: 64,
            max_cols: 64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    /// Preserve visual nesting depth when list items are converted back to
    /// paragraphs, instead of flattening the remaining items upward.
    pub keep_structure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasteRules {
    /// Removed together with their content.
    pub remove_tags: Vec<String>,
    /// Replaced by their children.
    pub strip_tags: Vec<String>,
    pub strip_attributes: Vec<String>,
    pub allow_file_images: bool,
}

impl Default for PasteRules {
    fn default() -> Self {
        Self {
            remove_tags: ["script", "style", "meta", "link", "title", "xml", "head", "object"]
                .into_iter()
                .map(String::from)
                .collect(),
            strip_tags: ["font", "o:p", "span"]
                .into_iter()
                .map(String::from)
                .collect(),
            strip_attributes: ["style", "class", "lang", "id"]
                .into_iter()
                .map(String::from)
                .collect(),
            allow_file_images: false,
        }
    }
}
