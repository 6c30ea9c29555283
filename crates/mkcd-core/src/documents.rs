//! Boilerplate documents generated into a new workspace.

use crate::error::Result;
use crate::settings::{IgnoreFlavor, LicenseFlavor};
use chrono::Datelike;
use std::path::Path;

/// What the document templates know about the project.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentContext {
    pub project_name: String,
    pub author: String,
    pub email: String,
    pub year: i32,
}

impl DocumentContext {
    /// Context for the workspace at `target`: the project name is its final
    /// path segment, the year is the current local year.
    pub fn for_target(target: &Path, author: &str, email: &str) -> Self {
        let project_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        Self {
            project_name,
            author: author.to_string(),
            email: email.to_string(),
            year: chrono::Local::now().year(),
        }
    }

    fn holder(&self) -> String {
        match (self.author.is_empty(), self.email.is_empty()) {
            (true, _) => "the project authors".to_string(),
            (false, true) => self.author.clone(),
            (false, false) => format!("{} <{}>", self.author, self.email),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Readme,
    Ignore(IgnoreFlavor),
    License(LicenseFlavor),
}

impl DocumentKind {
    pub fn file_name(self) -> &'static str {
        match self {
            DocumentKind::Readme => "README.md",
            DocumentKind::Ignore(_) => ".gitignore",
            DocumentKind::License(_) => "LICENSE",
        }
    }

    pub fn label(self) -> String {
        match self {
            DocumentKind::Readme => "README".to_string(),
            DocumentKind::Ignore(f) => format!(".gitignore ({f})"),
            DocumentKind::License(f) => format!("LICENSE ({f})"),
        }
    }
}

pub trait DocumentGenerator {
    fn render(&self, kind: DocumentKind, ctx: &DocumentContext) -> Result<String>;
}

/// Templates compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinDocuments;

impl DocumentGenerator for BuiltinDocuments {
    fn render(&self, kind: DocumentKind, ctx: &DocumentContext) -> Result<String> {
        Ok(match kind {
            DocumentKind::Readme => readme(ctx),
            DocumentKind::Ignore(flavor) => gitignore(flavor),
            DocumentKind::License(LicenseFlavor::Mit) => mit(ctx),
            DocumentKind::License(LicenseFlavor::Apache2) => apache(ctx),
        })
    }
}

fn readme(ctx: &DocumentContext) -> String {
    let mut out = format!(
        "# {name}\n\n\
         A short description of {name}.\n\n\
         ## Getting started\n\n\
         ```sh\n\
         cd {name}\n\
         ```\n\n\
         ## Contributing\n\n\
         Issues and pull requests are welcome.\n",
        name = ctx.project_name
    );
    if !ctx.author.is_empty() {
        out.push_str(&format!("\n## Author\n\n{}\n", ctx.holder()));
    }
    out
}

const COMMON_IGNORE: &str = "\
# Editors and OS files
.DS_Store
Thumbs.db
.idea/
.vscode/
*.swp
*~

# Environment
.env
.env.local
";

fn gitignore(flavor: IgnoreFlavor) -> String {
    let specific = match flavor {
        IgnoreFlavor::Go => {
            "\
# Go
*.exe
*.exe~
*.dll
*.so
*.dylib
*.test
*.out
vendor/
go.work
"
        }
        IgnoreFlavor::Node => {
            "\
# Node
node_modules/
npm-debug.log*
yarn-debug.log*
yarn-error.log*
dist/
build/
coverage/
.npm/
"
        }
        IgnoreFlavor::Python => {
            "\
# Python
__pycache__/
*.py[cod]
*.egg-info/
.eggs/
build/
dist/
.venv/
venv/
.pytest_cache/
.mypy_cache/
"
        }
        IgnoreFlavor::General => {
            "\
# Build output
build/
dist/
out/
tmp/
*.log
"
        }
    };
    format!("{specific}\n{COMMON_IGNORE}")
}

fn mit(ctx: &DocumentContext) -> String {
    format!(
        "MIT License\n\n\
         Copyright (c) {year} {holder}\n\n\
         Permission is hereby granted, free of charge, to any person obtaining a copy\n\
         of this software and associated documentation files (the \"Software\"), to deal\n\
         in the Software without restriction, including without limitation the rights\n\
         to use, copy, modify, merge, publish, distribute, sublicense, and/or sell\n\
         copies of the Software, and to permit persons to whom the Software is\n\
         furnished to do so, subject to the following conditions:\n\n\
         The above copyright notice and this permission notice shall be included in all\n\
         copies or substantial portions of the Software.\n\n\
         THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR\n\
         IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,\n\
         FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE\n\
         AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER\n\
         LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,\n\
         OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE\n\
         SOFTWARE.\n",
        year = ctx.year,
        holder = ctx.holder()
    )
}

fn apache(ctx: &DocumentContext) -> String {
    format!(
        "Copyright {year} {holder}\n\n\
         Licensed under the Apache License, Version 2.0 (the \"License\");\n\
         you may not use this file except in compliance with the License.\n\
         You may obtain a copy of the License at\n\n\
         \x20   http://www.apache.org/licenses/LICENSE-2.0\n\n\
         Unless required by applicable law or agreed to in writing, software\n\
         distributed under the License is distributed on an \"AS IS\" BASIS,\n\
         WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.\n\
         See the License for the specific language governing permissions and\n\
         limitations under the License.\n",
        year = ctx.year,
        holder = ctx.holder()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DocumentContext {
        DocumentContext {
            project_name: "widget".into(),
            author: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            year: 2024,
        }
    }

    #[test]
    fn context_takes_name_from_target() {
        let c = DocumentContext::for_target(Path::new("/tmp/work/widget"), "", "");
        assert_eq!(c.project_name, "widget");
        assert_eq!(c.holder(), "the project authors");
    }

    #[test]
    fn readme_names_project_and_author() {
        let text = BuiltinDocuments.render(DocumentKind::Readme, &ctx()).unwrap();
        assert!(text.starts_with("# widget\n"));
        assert!(text.contains("Ada Lovelace <ada@example.com>"));
    }

    #[test]
    fn gitignore_flavors_differ() {
        let node = BuiltinDocuments
            .render(DocumentKind::Ignore(IgnoreFlavor::Node), &ctx())
            .unwrap();
        let go = BuiltinDocuments
            .render(DocumentKind::Ignore(IgnoreFlavor::Go), &ctx())
            .unwrap();
        assert!(node.contains("node_modules/"));
        assert!(!go.contains("node_modules/"));
        assert!(go.contains(".DS_Store"));
    }

    #[test]
    fn licenses_carry_year_and_holder() {
        let mit = BuiltinDocuments
            .render(DocumentKind::License(LicenseFlavor::Mit), &ctx())
            .unwrap();
        assert!(mit.contains("Copyright (c) 2024 Ada Lovelace <ada@example.com>"));
        let apache = BuiltinDocuments
            .render(DocumentKind::License(LicenseFlavor::Apache2), &ctx())
            .unwrap();
        assert!(apache.contains("Apache License, Version 2.0"));
        assert!(apache.contains("    http://www.apache.org/licenses/LICENSE-2.0"));
    }

    #[test]
    fn file_names() {
        assert_eq!(DocumentKind::Readme.file_name(), "README.md");
        assert_eq!(
            DocumentKind::Ignore(IgnoreFlavor::General).file_name(),
            ".gitignore"
        );
        assert_eq!(
            DocumentKind::License(LicenseFlavor::Mit).file_name(),
            "LICENSE"
        );
    }
}
