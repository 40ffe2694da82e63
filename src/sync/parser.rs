//! Commit state-machine parser (C2).
//!
//! Consumes the line stream of
//! `git log --reverse --topo-order --raw --numstat --pretty=fuller --decorate=full --parents -M -C -c`
//! and reconstructs [`RawCommit`] records. Modeled as an explicit finite state
//! machine (`Init, Commit, Header, Message, File`) over an input iterator of
//! lines, per the Design Notes' "avoid mutable-module-level parser state"
//! guidance — all state lives in [`CommitLogParser`], not in statics.
//!
//! Grounded on the line-by-line subprocess-output walk in
//! `stackmuncher-src-git.rs.rs`'s `get_log()`, restructured as an explicit
//! state machine per the component design, with error handling and test
//! placement following this crate's `thiserror`/`#[cfg(test)]` conventions.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, FixedOffset};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::models::{CanonicalTrailer, FileAction, FileDelta, RawCommit, TrailerValue};
use crate::trailers;

const RING_BUFFER_CAP: usize = 30;
const MAX_HEADERS: usize = 1000;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed commit header at line {line_no}: {line:?}\ncontext:\n{context}")]
    MalformedCommitHeader { line_no: usize, line: String, context: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Init,
    Commit,
    Header,
    Message,
    File,
}

struct RingBuffer {
    buf: VecDeque<String>,
}

impl RingBuffer {
    fn new() -> Self {
        Self { buf: VecDeque::with_capacity(RING_BUFFER_CAP) }
    }

    fn push(&mut self, line: &str) {
        if self.buf.len() == RING_BUFFER_CAP {
            self.buf.pop_front();
        }
        self.buf.push_back(line.to_string());
    }

    fn render(&self) -> String {
        self.buf.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

static COMMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^commit ([0-9a-f]{40})$").unwrap());
static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9 _-]*):\s(.*)$").unwrap());
static NUMSTAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<added>\d+|-)\t(?P<removed>\d+|-)\t(?P<path>.+)$").unwrap());
static RENAME_BRACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(?P<old>[^{}]*) => (?P<new>[^{}]*)\}").unwrap());

/// Split `commit <sha> <parent-sha>* ( refs)?` into its parts. Parents and
/// decorate-refs are optional trailing segments of the commit line.
fn parse_commit_line(line: &str) -> Option<(String, Vec<String>, Vec<String>)> {
    if !line.starts_with("commit ") {
        return None;
    }
    let rest = line[7..].trim_end();

    let (sha_and_parents, refs) = if rest.ends_with(')') {
        match rest.rfind(" (") {
            Some(idx) => (&rest[..idx], Some(&rest[idx + 2..rest.len() - 1])),
            None => (rest, None),
        }
    } else {
        (rest, None)
    };

    let mut tokens = sha_and_parents.split_whitespace();
    let sha = tokens.next()?;
    if sha.len() != 40 || !sha.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let parents: Vec<String> = tokens
        .filter(|t| t.len() == 40 && t.bytes().all(|b| b.is_ascii_hexdigit()))
        .map(str::to_string)
        .collect();

    let refs: Vec<String> = refs
        .map(|s| s.split(',').map(|r| r.trim().to_string()).filter(|r| !r.is_empty()).collect())
        .unwrap_or_default();

    Some((sha.to_string(), parents, refs))
}

/// Rewrite `a/{old => new}/b` or a bare `old => new` into its pre-rename
/// (old) path, returning the post-rename path alongside when one was found.
fn canonicalize_rename(path: &str) -> (String, Option<String>) {
    if let Some(caps) = RENAME_BRACE_RE.captures(path) {
        let old_full = RENAME_BRACE_RE.replace(path, &caps["old"]).to_string();
        let new_full = RENAME_BRACE_RE.replace(path, &caps["new"]).to_string();
        return (old_full, Some(new_full));
    }
    if let Some(idx) = path.find(" => ") {
        let old = path[..idx].trim().to_string();
        let new = path[idx + 4..].trim().to_string();
        return (old, Some(new));
    }
    (path.to_string(), None)
}

fn parse_action_line(line: &str) -> Option<(String, Option<String>, FileAction, Option<String>, Option<String>, Option<String>, Option<String>)> {
    if !line.starts_with(':') {
        return None;
    }
    let mut tab_parts = line.splitn(2, '\t');
    let meta = tab_parts.next()?;
    let paths_part = tab_parts.next()?;

    let tokens: Vec<&str> = meta.split_whitespace().collect();
    if tokens.len() < 2 {
        return None;
    }
    let status_token = *tokens.last()?;
    let action = FileAction::from_code(status_token);

    let old_mode = tokens.first().map(|t| t.trim_start_matches(':').to_string());
    let new_mode = tokens.get(1).map(|t| t.to_string());
    let old_index = tokens.get(2).map(|t| t.to_string());
    let new_index = tokens.get(3).map(|t| t.to_string());

    let mut path_iter = paths_part.split('\t');
    let raw_path = path_iter.next()?.to_string();
    let explicit_new_path = path_iter.next().map(str::to_string);

    let (path, implied_new) = canonicalize_rename(&raw_path);
    let new_path = explicit_new_path.or(implied_new);

    Some((path, new_path, action, old_mode, new_mode, old_index, new_index))
}

struct InProgressCommit {
    sha: String,
    parent_shas: Vec<String>,
    refs: Vec<String>,
    headers: HashMap<String, String>,
    message_lines: Vec<String>,
    trailers: HashMap<CanonicalTrailer, TrailerValue>,
    renamed_trailers: HashMap<String, TrailerValue>,
    files: Vec<FileDelta>,
    file_index: HashMap<String, usize>,
    header_count: usize,
}

impl InProgressCommit {
    fn new(sha: String, parent_shas: Vec<String>, refs: Vec<String>) -> Self {
        Self {
            sha,
            parent_shas,
            refs,
            headers: HashMap::new(),
            message_lines: Vec::new(),
            trailers: HashMap::new(),
            renamed_trailers: HashMap::new(),
            files: Vec::new(),
            file_index: HashMap::new(),
            header_count: 0,
        }
    }

    fn upsert_file<F: FnOnce(&mut FileDelta)>(&mut self, path: String, apply: F) {
        if let Some(&idx) = self.file_index.get(&path) {
            apply(&mut self.files[idx]);
        } else {
            let mut delta = FileDelta {
                path: path.clone(),
                action: FileAction::Unknown,
                added: None,
                removed: None,
                old_modes: None,
                new_modes: None,
                old_index: None,
                new_index: None,
                new_path: None,
            };
            apply(&mut delta);
            self.file_index.insert(path, self.files.len());
            self.files.push(delta);
        }
    }

    fn record_trailer(&mut self, canon: CanonicalTrailer, value: String) {
        let header_name = canon.header_name();
        if self.headers.contains_key(header_name) {
            self.renamed_trailers
                .entry(format!("{header_name}-Trailer"))
                .and_modify(|existing| existing.push(value.clone()))
                .or_insert_with(|| TrailerValue::Single(value));
            return;
        }
        self.trailers
            .entry(canon)
            .and_modify(|existing| existing.push(value.clone()))
            .or_insert_with(|| TrailerValue::Single(value));
    }

    fn finish(self, empty_commit: bool) -> RawCommit {
        let message = self.message_lines.join("\n");
        RawCommit {
            sha: self.sha,
            parent_shas: self.parent_shas,
            refs: self.refs,
            author_raw: self.headers.get("Author").cloned().unwrap_or_default(),
            committer_raw: self.headers.get("Commit").cloned().unwrap_or_default(),
            author_date: parse_header_date(self.headers.get("AuthorDate")),
            commit_date: parse_header_date(self.headers.get("CommitDate")),
            message,
            files: self.files,
            trailers: self.trailers,
            renamed_trailers: self.renamed_trailers,
            headers: self.headers,
            empty_commit,
        }
    }
}

fn parse_header_date(raw: Option<&String>) -> Option<DateTime<FixedOffset>> {
    raw.and_then(|s| DateTime::parse_from_str(s.trim(), "%a %b %-d %H:%M:%S %Y %z").ok())
}

/// Lazily parses a `git log` line stream into [`RawCommit`] records.
pub struct CommitLogParser<I> {
    lines: I,
    state: ParserState,
    ring: RingBuffer,
    line_no: usize,
    current: Option<InProgressCommit>,
    pending_commit_line: Option<String>,
    done: bool,
}

impl<I: Iterator<Item = String>> CommitLogParser<I> {
    pub fn new(lines: I) -> Self {
        Self {
            lines,
            state: ParserState::Init,
            ring: RingBuffer::new(),
            line_no: 0,
            current: None,
            pending_commit_line: None,
            done: false,
        }
    }

    fn next_line(&mut self) -> Option<String> {
        if let Some(line) = self.pending_commit_line.take() {
            return Some(line);
        }
        let line = self.lines.next()?;
        self.line_no += 1;
        self.ring.push(&line);
        Some(line)
    }

    fn open_commit(&mut self, line: &str) -> Result<(), ParseError> {
        match parse_commit_line(line) {
            Some((sha, parents, refs)) => {
                self.current = Some(InProgressCommit::new(sha, parents, refs));
                self.state = ParserState::Header;
                Ok(())
            }
            None => Err(ParseError::MalformedCommitHeader {
                line_no: self.line_no,
                line: line.to_string(),
                context: self.ring.render(),
            }),
        }
    }
}

impl<I: Iterator<Item = String>> Iterator for CommitLogParser<I> {
    type Item = Result<RawCommit, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            match self.state {
                ParserState::Init => {
                    let Some(line) = self.next_line() else {
                        self.done = true;
                        return None;
                    };
                    if line.is_empty() {
                        self.state = ParserState::Commit;
                    }
                    // Non-blank lines before the first commit are tolerated
                    // (e.g. a leading banner) and simply skipped.
                }
                ParserState::Commit => {
                    let Some(line) = self.next_line() else {
                        self.done = true;
                        return None;
                    };
                    if line.is_empty() {
                        continue;
                    }
                    if let Err(e) = self.open_commit(&line) {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
                ParserState::Header => {
                    let Some(line) = self.next_line() else {
                        self.done = true;
                        let commit = self.current.take().map(|c| c.finish(true));
                        return commit.map(Ok);
                    };
                    if line.is_empty() {
                        self.state = ParserState::Message;
                        continue;
                    }
                    if let Some(caps) = HEADER_RE.captures(&line) {
                        let commit = self.current.as_mut().expect("commit open in Header state");
                        if commit.header_count < MAX_HEADERS {
                            commit
                                .headers
                                .insert(caps[1].trim().to_string(), caps[2].trim().to_string());
                            commit.header_count += 1;
                        }
                    } else {
                        log::warn!(
                            "ignoring malformed header line {}: {:?}\ncontext:\n{}",
                            self.line_no,
                            line,
                            self.ring.render()
                        );
                    }
                }
                ParserState::Message => {
                    let Some(line) = self.next_line() else {
                        self.done = true;
                        let commit = self.current.take().map(|c| c.finish(true));
                        return commit.map(Ok);
                    };
                    if line.is_empty() {
                        self.state = ParserState::File;
                        continue;
                    }
                    if let Some(body) = line.strip_prefix("    ") {
                        let commit = self.current.as_mut().expect("commit open in Message state");
                        commit.message_lines.push(body.to_string());
                        if let Some(caps) = HEADER_RE.captures(body) {
                            if let Some(canon_list) = trailers::lookup(caps[1].trim()) {
                                let value = caps[2].trim().to_string();
                                for canon in canon_list {
                                    commit.record_trailer(*canon, value.clone());
                                }
                            }
                        }
                    }
                    // Blank-prefixed continuation lines that aren't 4-space
                    // indented are not message body per the grammar; ignored.
                }
                ParserState::File => {
                    let Some(line) = self.next_line() else {
                        self.done = true;
                        let commit = self.current.take().map(|c| c.finish(false));
                        return commit.map(Ok);
                    };
                    if line.is_empty() {
                        // Separates the --raw block from the --numstat block
                        // (and precedes the next commit); stay in File and
                        // let the next non-blank line decide.
                        continue;
                    }
                    if let Some((sha, parents, refs)) = parse_commit_line(&line) {
                        let finished = self.current.take().map(|c| c.finish(false));
                        self.current = Some(InProgressCommit::new(sha, parents, refs));
                        self.state = ParserState::Header;
                        if let Some(commit) = finished {
                            return Some(Ok(commit));
                        }
                        continue;
                    }
                    if let Some((path, new_path, action, old_mode, new_mode, old_index, new_index)) =
                        parse_action_line(&line)
                    {
                        let commit = self.current.as_mut().expect("commit open in File state");
                        commit.upsert_file(path, |delta| {
                            delta.action = action;
                            delta.new_path = new_path;
                            delta.old_modes = old_mode;
                            delta.new_modes = new_mode;
                            delta.old_index = old_index;
                            delta.new_index = new_index;
                        });
                        continue;
                    }
                    if let Some(caps) = NUMSTAT_RE.captures(&line) {
                        let (path, new_path) = canonicalize_rename(&caps["path"]);
                        let added = caps["added"].parse::<u64>().ok();
                        let removed = caps["removed"].parse::<u64>().ok();
                        let commit = self.current.as_mut().expect("commit open in File state");
                        commit.upsert_file(path, |delta| {
                            delta.added = added;
                            delta.removed = removed;
                            if delta.new_path.is_none() {
                                delta.new_path = new_path;
                            }
                        });
                        continue;
                    }
                    log::warn!(
                        "ignoring malformed file line {}: {:?}\ncontext:\n{}",
                        self.line_no,
                        line,
                        self.ring.render()
                    );
                }
            }
        }
    }
}

pub fn parse(lines: impl Iterator<Item = String>) -> CommitLogParser<impl Iterator<Item = String>> {
    CommitLogParser::new(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> impl Iterator<Item = String> {
        text.lines().map(str::to_string).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn parses_single_author_commit_with_signoff() {
        let log = "\ncommit 0123456789abcdef0123456789abcdef01234567\n\
Author:     Alice <a@x>\n\
AuthorDate: Mon Jan 5 10:00:00 2026 +0000\n\
Commit:     Alice <a@x>\n\
CommitDate: Mon Jan 5 10:00:00 2026 +0000\n\
\n\
    init\n\
\n\
    Signed-off-by: Alice <a@x>\n\
\n\
:000000 100644 0000000 1111111 A\tREADME.md\n\
\n\
2\t0\tREADME.md\n";

        let commits: Vec<_> = parse(lines(log)).collect::<Result<_, _>>().unwrap();
        assert_eq!(commits.len(), 1);
        let commit = &commits[0];
        assert_eq!(commit.sha, "0123456789abcdef0123456789abcdef01234567");
        assert_eq!(commit.author_raw, "Alice <a@x>");
        assert_eq!(commit.message, "init\n\nSigned-off-by: Alice <a@x>");
        assert_eq!(commit.files.len(), 1);
        assert_eq!(commit.files[0].path, "README.md");
        assert_eq!(commit.files[0].added, Some(2));
        assert!(commit.trailers.contains_key(&CanonicalTrailer::SignedOffBy));
    }

    #[test]
    fn empty_commit_has_no_files() {
        let log = "\ncommit 1111111111111111111111111111111111111111\n\
Author:     Bob <b@x>\n\
AuthorDate: Mon Jan 5 10:00:00 2026 +0000\n\
Commit:     Bob <b@x>\n\
CommitDate: Mon Jan 5 10:00:00 2026 +0000\n\
\n\
    empty\n\
\n";

        let commits: Vec<_> = parse(lines(log)).collect::<Result<_, _>>().unwrap();
        assert_eq!(commits.len(), 1);
        assert!(commits[0].files.is_empty());
    }

    #[test]
    fn rename_collapses_into_one_file_entry() {
        let log = "\ncommit 2222222222222222222222222222222222222222\n\
Author:     Carol <c@x>\n\
AuthorDate: Mon Jan 5 10:00:00 2026 +0000\n\
Commit:     Carol <c@x>\n\
CommitDate: Mon Jan 5 10:00:00 2026 +0000\n\
\n\
    rename\n\
\n\
:100644 100644 abc1234 def5678 R100\ta/old/f.c\ta/new/f.c\n\
\n\
1\t2\ta/{old => new}/f.c\n";

        let commits: Vec<_> = parse(lines(log)).collect::<Result<_, _>>().unwrap();
        let commit = &commits[0];
        assert_eq!(commit.files.len(), 1);
        assert_eq!(commit.files[0].path, "a/old/f.c");
        assert_eq!(commit.files[0].added, Some(1));
        assert_eq!(commit.files[0].removed, Some(2));
    }

    #[test]
    fn malformed_commit_header_is_fatal() {
        let log = "\ncommit not-a-sha\n";
        let result: Result<Vec<_>, _> = parse(lines(log)).collect();
        assert!(result.is_err());
    }

    #[test]
    fn header_count_capped_at_max_headers() {
        let mut log = String::from("\ncommit 3333333333333333333333333333333333333333\n");
        for i in 0..1005 {
            log.push_str(&format!("X-Extra-{i}: v\n"));
        }
        log.push_str("Author:     Dana <d@x>\n");
        log.push_str("AuthorDate: Mon Jan 5 10:00:00 2026 +0000\n");
        log.push_str("Commit:     Dana <d@x>\n");
        log.push_str("CommitDate: Mon Jan 5 10:00:00 2026 +0000\n\n    msg\n\n");

        let commits: Vec<_> = parse(lines(&log)).collect::<Result<_, _>>().unwrap();
        assert_eq!(commits[0].headers.len(), MAX_HEADERS);
    }
}
