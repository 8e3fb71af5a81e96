//! Declarative response predicates.
//!
//! Most platforms decide presence or absence from a handful of facts about a
//! response: a status code, a marker string in the body, the handle echoed
//! back, the final URL after redirects. [`Evidence`] expresses those facts as
//! a small tree evaluated against a [`ProbeResponse`] and the handle under
//! test.

use regex::Regex;

use crate::checks::core::ProbeResponse;

/// Placeholder substituted with the handle in templated markers and URLs.
pub const HANDLE_PLACEHOLDER: &str = "{handle}";

#[derive(Debug, Clone)]
pub enum Evidence {
    Status(u16),
    StatusOtherThan(u16),
    /// Matches when any needle occurs in the body.
    Markers {
        needles: Vec<String>,
        case_sensitive: bool,
    },
    HandleInBody {
        case_sensitive: bool,
    },
    /// Marker containing [`HANDLE_PLACEHOLDER`].
    HandleTemplate {
        template: String,
        case_sensitive: bool,
    },
    FinalUrlStartsWith(String),
    HeaderEquals {
        name: String,
        value: String,
    },
    Pattern(Regex),
    All(Vec<Evidence>),
    Any(Vec<Evidence>),
    Not(Box<Evidence>),
}

impl Evidence {
    pub fn status(code: u16) -> Self {
        Evidence::Status(code)
    }

    pub fn status_other_than(code: u16) -> Self {
        Evidence::StatusOtherThan(code)
    }

    pub fn marker(needle: &str) -> Self {
        Self::markers(&[needle])
    }

    pub fn markers(needles: &[&str]) -> Self {
        Evidence::Markers {
            needles: needles.iter().map(|needle| needle.to_string()).collect(),
            case_sensitive: true,
        }
    }

    pub fn markers_ci(needles: &[&str]) -> Self {
        Evidence::Markers {
            needles: needles.iter().map(|needle| needle.to_lowercase()).collect(),
            case_sensitive: false,
        }
    }

    pub fn handle_in_body() -> Self {
        Evidence::HandleInBody {
            case_sensitive: true,
        }
    }

    pub fn handle_in_body_ci() -> Self {
        Evidence::HandleInBody {
            case_sensitive: false,
        }
    }

    pub fn templated(template: &str) -> Self {
        Evidence::HandleTemplate {
            template: template.to_string(),
            case_sensitive: true,
        }
    }

    pub fn templated_ci(template: &str) -> Self {
        Evidence::HandleTemplate {
            template: template.to_lowercase(),
            case_sensitive: false,
        }
    }

    pub fn final_url_starts_with(prefix: &str) -> Self {
        Evidence::FinalUrlStartsWith(prefix.to_string())
    }

    pub fn header_equals(name: &str, value: &str) -> Self {
        Evidence::HeaderEquals {
            name: name.to_ascii_lowercase(),
            value: value.to_string(),
        }
    }

    pub fn pattern(regex: Regex) -> Self {
        Evidence::Pattern(regex)
    }

    pub fn all(parts: impl IntoIterator<Item = Evidence>) -> Self {
        Evidence::All(parts.into_iter().collect())
    }

    pub fn any(parts: impl IntoIterator<Item = Evidence>) -> Self {
        Evidence::Any(parts.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Evidence) -> Self {
        Evidence::Not(Box::new(inner))
    }

    pub fn matches(&self, response: &ProbeResponse, handle: &str) -> bool {
        let mut lowered = LazyLower::new(&response.body);
        self.eval(response, handle, &mut lowered)
    }

    fn eval(&self, response: &ProbeResponse, handle: &str, lowered: &mut LazyLower<'_>) -> bool {
        match self {
            Evidence::Status(code) => response.status == *code,
            Evidence::StatusOtherThan(code) => response.status != *code,
            Evidence::Markers {
                needles,
                case_sensitive: true,
            } => needles.iter().any(|needle| response.body.contains(needle.as_str())),
            Evidence::Markers {
                needles,
                case_sensitive: false,
            } => {
                let body = lowered.get();
                needles.iter().any(|needle| body.contains(needle.as_str()))
            }
            Evidence::HandleInBody { case_sensitive } => {
                if *case_sensitive {
                    response.body.contains(handle)
                } else {
                    lowered.get().contains(&handle.to_lowercase())
                }
            }
            Evidence::HandleTemplate {
                template,
                case_sensitive,
            } => {
                if *case_sensitive {
                    let needle = template.replace(HANDLE_PLACEHOLDER, handle);
                    response.body.contains(&needle)
                } else {
                    let needle = template.replace(HANDLE_PLACEHOLDER, &handle.to_lowercase());
                    lowered.get().contains(&needle)
                }
            }
            Evidence::FinalUrlStartsWith(prefix) => response.url.as_str().starts_with(prefix.as_str()),
            Evidence::HeaderEquals { name, value } => response.header(name) == Some(value.as_str()),
            Evidence::Pattern(regex) => regex.is_match(&response.body),
            Evidence::All(parts) => parts.iter().all(|part| part.eval(response, handle, lowered)),
            Evidence::Any(parts) => parts.iter().any(|part| part.eval(response, handle, lowered)),
            Evidence::Not(inner) => !inner.eval(response, handle, lowered),
        }
    }
}

/// Lowercases the body at most once per evaluation.
struct LazyLower<'a> {
    source: &'a str,
    lowered: Option<String>,
}

impl<'a> LazyLower<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            lowered: None,
        }
    }

    fn get(&mut self) -> &str {
        self.lowered.get_or_insert_with(|| self.source.to_lowercase())
    }
}
