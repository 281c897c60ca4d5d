//! Minimal `go.mod` reader
//!
//! Only the directives the coordinator needs: `module`, `require` and
//! `replace`, in both single-line and block form.

/// One `require` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Require {
    pub(crate) path: String,
    pub(crate) version: String,
}

/// One `replace` entry; `new_version` is empty for local path targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Replace {
    pub(crate) old_path: String,
    pub(crate) new_path: String,
    pub(crate) new_version: String,
}

/// Parsed directives of a `go.mod`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct GoMod {
    pub(crate) module: Option<String>,
    pub(crate) requires: Vec<Require>,
    pub(crate) replaces: Vec<Replace>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Require,
    Replace,
    Other,
}

impl GoMod {
    pub(crate) fn parse(content: &str) -> Self {
        let mut parsed = Self::default();
        let mut block = Block::None;

        for raw in content.lines() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }

            if block != Block::None {
                if line == ")" {
                    block = Block::None;
                } else {
                    parsed.push(block, line);
                }
                continue;
            }

            let (keyword, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let rest = rest.trim();
            let kind = match keyword {
                "module" => {
                    parsed.module = Some(unquote(rest).to_string()).filter(|m| !m.is_empty());
                    continue;
                }
                "require" => Block::Require,
                "replace" => Block::Replace,
                _ => Block::Other,
            };

            if rest == "(" {
                block = kind;
            } else {
                parsed.push(kind, rest);
            }
        }

        parsed
    }

    fn push(&mut self, block: Block, entry: &str) {
        match block {
            Block::Require => {
                let mut fields = entry.split_whitespace().map(unquote);
                if let (Some(path), Some(version)) = (fields.next(), fields.next()) {
                    self.requires.push(Require {
                        path: path.to_string(),
                        version: version.to_string(),
                    });
                }
            }
            Block::Replace => {
                let Some((old, new)) = entry.split_once("=>") else {
                    return;
                };
                let Some(old_path) = old.split_whitespace().map(unquote).next() else {
                    return;
                };
                let mut new_fields = new.split_whitespace().map(unquote);
                let Some(new_path) = new_fields.next() else {
                    return;
                };
                self.replaces.push(Replace {
                    old_path: old_path.to_string(),
                    new_path: new_path.to_string(),
                    new_version: new_fields.next().unwrap_or_default().to_string(),
                });
            }
            Block::None | Block::Other => {}
        }
    }

    /// Effective version of a dependency, honoring `replace`
    pub(crate) fn effective_version(&self, module: &str) -> Option<&str> {
        let required = self
            .requires
            .iter()
            .find(|r| r.path == module)
            .map(|r| r.version.as_str())?;

        let replaced = self
            .replaces
            .iter()
            .rev()
            .find(|r| r.old_path == module && !r.new_version.is_empty())
            .map(|r| r.new_version.as_str());

        Some(replaced.unwrap_or(required))
    }
}

fn strip_comment(line: &str) -> &str {
    line.split_once("//").map_or(line, |(code, _)| code)
}

fn unquote(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '`')
}
