//! Syntax tree and output tree nodes for Quill.
//!
//! Two owned trees flow through the translation pipeline:
//!
//! - [`Token`]: the abstract syntax tree built by token components while a
//!   document is tokenized.
//! - [`Element`]/[`Node`]: the output tree built by render components for one
//!   output format, serialised with [`Element::to_html`] or
//!   [`Element::to_latex`].
//!
//! A parent exclusively owns its children in both trees.
//!
//! # Example
//!
//! ```
//! use quill_tree::{Element, Token};
//!
//! let mut root = Token::root();
//! root.append(Token::new("Heading").with_attr("level", "1"))
//!     .append(Token::string("Intro"));
//! assert_eq!(root.find("Heading").and_then(|t| t.get("level")), Some("1"));
//!
//! let mut html = Element::root();
//! html.append_element(Element::new("h1")).append_text("Intro");
//! assert_eq!(html.to_html(), "<h1>Intro</h1>");
//! ```

mod element;
mod escape;
mod token;

pub use element::{Element, Node};
pub use escape::{escape_html, escape_latex};
pub use token::{DISABLED, ROOT, STRING, Token, TokenIter};
