//! Run options and their validation.
//!
//! Every option with a checker is listed in [`VALIDATORS`]. All checkers run
//! before any I/O; if one fails, the command exits with status 1.

use chrono::NaiveDate;

use crate::models::PostFilter;

/// Options of `escape-ngg run`, as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub post_in: Option<String>,
    pub post_type: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub post_status: Option<String>,
    pub verbose: bool,
    pub dry_run: bool,
    pub limit: Option<u64>,
}

type Validator = fn(&RunOptions) -> Result<(), String>;

/// Option name to checker, evaluated in order.
pub const VALIDATORS: &[(&str, Validator)] = &[
    ("start_date", check_start_date),
    ("end_date", check_end_date),
    ("post__in", check_post_in),
    ("post_type", check_post_type),
    ("author", check_author),
    ("category", check_category),
    ("post_status", check_post_status),
];

const POST_STATUSES: [&str; 8] = [
    "publish", "future", "draft", "pending", "private", "trash", "auto-draft", "inherit",
];

impl RunOptions {
    /// Run every checker and collect all failures.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let problems: Vec<String> = VALIDATORS
            .iter()
            .filter_map(|(name, check)| check(self).err().map(|e| format!("--{}: {}", name, e)))
            .collect();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// The query filter these options select. Call after [`validate`](Self::validate);
    /// unparseable values are ignored here.
    pub fn post_filter(&self) -> PostFilter {
        PostFilter {
            start_date: self.start_date.as_deref().and_then(|s| parse_date(s).ok()),
            end_date: self.end_date.as_deref().and_then(|s| parse_date(s).ok()),
            post_ids: self
                .post_in
                .as_deref()
                .and_then(|s| parse_id_list(s).ok())
                .unwrap_or_default(),
        }
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}', expected YYYY-MM-DD", value))
}

fn parse_id_list(value: &str) -> Result<Vec<u64>, String> {
    value
        .split(',')
        .map(str::trim)
        .map(|part| match part.parse::<u64>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(format!("invalid post id '{}'", part)),
        })
        .collect()
}

fn check_start_date(opts: &RunOptions) -> Result<(), String> {
    match &opts.start_date {
        Some(s) => parse_date(s).map(|_| ()),
        None => Ok(()),
    }
}

fn check_end_date(opts: &RunOptions) -> Result<(), String> {
    let Some(end) = &opts.end_date else {
        return Ok(());
    };
    let end = parse_date(end)?;
    if let Some(Ok(start)) = opts.start_date.as_deref().map(parse_date) {
        if end < start {
            return Err(format!("{} is before start_date {}", end, start));
        }
    }
    Ok(())
}

fn check_post_in(opts: &RunOptions) -> Result<(), String> {
    match &opts.post_in {
        Some(s) => parse_id_list(s).map(|_| ()),
        None => Ok(()),
    }
}

fn check_post_type(opts: &RunOptions) -> Result<(), String> {
    match opts.post_type.as_deref() {
        None | Some("post") | Some("page") => Ok(()),
        Some(other) => Err(format!("unsupported post type '{}', expected post or page", other)),
    }
}

fn check_author(opts: &RunOptions) -> Result<(), String> {
    let Some(author) = opts.author.as_deref() else {
        return Ok(());
    };
    match author.parse::<u64>() {
        Ok(id) if id > 0 => Ok(()),
        _ => Err(format!("invalid author '{}', expected a user id", author)),
    }
}

fn check_category(opts: &RunOptions) -> Result<(), String> {
    match opts.category.as_deref() {
        Some(c) if c.trim().is_empty() => Err("category must not be empty".to_string()),
        _ => Ok(()),
    }
}

fn check_post_status(opts: &RunOptions) -> Result<(), String> {
    match opts.post_status.as_deref() {
        None | Some("any") => Ok(()),
        Some(s) if POST_STATUSES.contains(&s) => Ok(()),
        Some(s) => Err(format!("unknown post status '{}'", s)),
    }
}
