use serde::{Deserialize, Serialize};
use std::fmt;

/// Category tag a module files itself under
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Core,
    Utils,
    Admin,
    Fun,
    #[default]
    Misc,
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Core => "core",
            Category::Utils => "utils",
            Category::Admin => "admin",
            Category::Fun => "fun",
            Category::Misc => "misc",
        }
    }

    pub fn emoji(&self) -> &str {
        match self {
            Category::Core => "🧪",
            Category::Utils => "🔧",
            Category::Admin => "👑",
            Category::Fun => "🎭",
            Category::Misc => "📦",
        }
    }

    /// Unknown tags fall back to `Misc`.
    pub fn parse(tag: &str) -> Self {
        match tag.to_lowercase().as_str() {
            "core" => Category::Core,
            "utils" => Category::Utils,
            "admin" => Category::Admin,
            "fun" => Category::Fun,
            _ => Category::Misc,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata a module declares about itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMeta {
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub category: Category,
}

impl ModuleMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            author: "Unknown".to_string(),
            description: "No description".to_string(),
            category: Category::Misc,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }
}

/// Snapshot of one loaded module as seen by queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDescriptor {
    /// Source-unit identifier the module was loaded from
    pub identifier: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub category: Category,
    /// Qualified command names, in registration order
    pub commands: Vec<String>,
    pub loaded: bool,
}

impl ModuleDescriptor {
    pub fn new(identifier: impl Into<String>, meta: &ModuleMeta, commands: Vec<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: meta.name.clone(),
            version: meta.version.clone(),
            author: meta.author.clone(),
            description: meta.description.clone(),
            category: meta.category,
            commands,
            loaded: true,
        }
    }
}
