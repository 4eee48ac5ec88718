//! Fixtures shared by unit tests across modules.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::materialize::Materializer;

pub const WISHLIST: &str = r#"
extends = "BaseTemplate"

[exports.WishlistTemplate]
folder = "Wishlist/Items"
body = """
# {{title}}

- url: {{url}}
- price: {{price}}
- category: {{category}}
"""

[exports.WishlistTemplate.descriptor]
name = "Wishlist"
version = "1.0.0"
required_fields = ["title", "url", "type", "price", "category"]
optional_fields = ["notes"]
supported_types = ["wishlist"]

[[exports.WishlistTemplate.prompts]]
field = "title"

[[exports.WishlistTemplate.prompts]]
field = "price"
placeholder = "0.00"
pattern = '^\d+(\.\d{1,2})?$'
retry_message = "price must be a number"

[[exports.WishlistTemplate.prompts]]
field = "category"
choices = ["books", "games", "tools"]
"#;

pub const BOOK: &str = r##"
extends = "BaseTemplate"

[exports.BookTemplate]
folder = "Books"
body = "# {{title}}\n\nauthor: {{author}}\nsource: {{url}}\n"

[exports.BookTemplate.descriptor]
name = "Book"
required_fields = ["title", "url", "type", "author"]

[[exports.BookTemplate.prompts]]
field = "author"
"##;

/// Parses, but declares no export the loader can find.
pub const NO_EXPORT: &str = r#"
extends = "BaseTemplate"
"#;

/// Does not parse at all.
pub const BROKEN: &str = "extends = \"BaseTemplate\"\n[exports.\n";

/// Loads fine but declares no core fields.
pub const BAD_METADATA: &str = r#"
extends = "BaseTemplate"

[exports.SparseTemplate]
body = "x"
prompts = []

[exports.SparseTemplate.descriptor]
name = "Sparse"
required_fields = ["title"]
"#;

pub fn write_template(dir: &Path, file_name: &str, source: &str) -> PathBuf {
    let path = dir.join(file_name);
    fs::write(&path, source).expect("write template fixture");
    path
}

/// Records every write instead of touching the disk.
#[derive(Debug, Default)]
pub struct RecordingMaterializer {
    pub writes: Vec<(String, String, String)>,
}

impl Materializer for RecordingMaterializer {
    fn write_artifact(&mut self, folder: &str, name: &str, content: &str) -> Result<PathBuf> {
        self.writes
            .push((folder.to_string(), name.to_string(), content.to_string()));
        Ok(PathBuf::from(folder).join(format!("{name}.md")))
    }
}
