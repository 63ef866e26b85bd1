//! Cursor pagination
//!
//! [`paginate`] turns a page-fetching closure into a finite stream of items.
//! The stream keeps no global position, so calling it again with the same
//! start cursor restarts the iteration.

use crate::diagnostic::{Diagnostic, DiagnosticCode};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::future::Future;

/// Smallest page size the API accepts.
pub const MIN_PAGE_LIMIT: u32 = 1;
/// Largest page size the API accepts.
pub const MAX_PAGE_LIMIT: u32 = 100;
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Sort order by creation time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Position within a paginated list. Tokens are opaque and passed back
/// to the API unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageCursor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    pub limit: u32,
    #[serde(default)]
    pub order: SortOrder,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_LIMIT)
    }
}

impl PageCursor {
    /// Cursor for the first page.
    pub fn first(limit: u32) -> Self {
        Self {
            after: None,
            before: None,
            limit,
            order: SortOrder::default(),
        }
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn starting_after(mut self, token: impl Into<String>) -> Self {
        self.after = Some(token.into());
        self.before = None;
        self
    }

    pub fn ending_before(mut self, token: impl Into<String>) -> Self {
        self.before = Some(token.into());
        self.after = None;
        self
    }

    /// Whether iteration walks backwards (`before` cursors).
    pub fn is_backward(&self) -> bool {
        self.before.is_some()
    }

    /// The token this cursor carries, if any.
    pub fn token(&self) -> Option<&str> {
        self.before.as_deref().or(self.after.as_deref())
    }

    /// Cursor for the page following this one, in the same direction.
    pub fn advance(&self, token: String) -> Self {
        let next = Self {
            after: None,
            before: None,
            limit: self.limit,
            order: self.order,
        };
        if self.is_backward() {
            next.ending_before(token)
        } else {
            next.starting_after(token)
        }
    }

    /// Query parameters for a list request.
    pub fn query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            ("limit".to_string(), self.limit.to_string()),
            ("order".to_string(), self.order.as_str().to_string()),
        ];
        if let Some(after) = &self.after {
            query.push(("after".to_string(), after.clone()));
        }
        if let Some(before) = &self.before {
            query.push(("before".to_string(), before.clone()));
        }
        query
    }

    pub fn validate(&self) -> Result<(), Diagnostic> {
        if !(MIN_PAGE_LIMIT..=MAX_PAGE_LIMIT).contains(&self.limit) {
            return Err(Diagnostic::fatal(
                DiagnosticCode::InvalidRequest,
                format!(
                    "page limit {} is outside {}..={}",
                    self.limit, MIN_PAGE_LIMIT, MAX_PAGE_LIMIT
                ),
            ));
        }
        if self.after.is_some() && self.before.is_some() {
            return Err(Diagnostic::fatal(
                DiagnosticCode::InvalidRequest,
                "a cursor cannot carry both `after` and `before`",
            ));
        }
        Ok(())
    }
}

/// One fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub has_more: bool,
    /// Token to continue from in the current direction
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, has_more: bool, next_cursor: Option<String>) -> Self {
        Self {
            data,
            has_more,
            next_cursor,
        }
    }

    /// Final page.
    pub fn last(data: Vec<T>) -> Self {
        Self::new(data, false, None)
    }
}

struct PageState<F, T> {
    fetch: F,
    next: Option<PageCursor>,
    buffer: VecDeque<T>,
    seen: HashSet<String>,
    pending_error: Option<Diagnostic>,
}

/// Stream every item reachable from `start`.
///
/// Items come out in server order, without deduplication. The stream ends
/// after the first page with `has_more == false`. A cursor that was already
/// visited fails with `PaginationLoop` before it is fetched again.
pub fn paginate<T, F, Fut>(start: PageCursor, fetch: F) -> impl Stream<Item = Result<T, Diagnostic>>
where
    F: FnMut(PageCursor) -> Fut,
    Fut: Future<Output = Result<Page<T>, Diagnostic>>,
{
    let state = PageState {
        fetch,
        next: Some(start),
        buffer: VecDeque::new(),
        seen: HashSet::new(),
        pending_error: None,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.buffer.pop_front() {
                return Some((Ok(item), state));
            }
            if let Some(err) = state.pending_error.take() {
                return Some((Err(err), state));
            }

            let cursor = state.next.take()?;
            if let Err(err) = cursor.validate() {
                return Some((Err(err), state));
            }
            if let Some(token) = cursor.token() {
                if !state.seen.insert(token.to_string()) {
                    let err = Diagnostic::fatal(
                        DiagnosticCode::PaginationLoop,
                        format!("cursor '{}' was returned twice", token),
                    );
                    return Some((Err(err), state));
                }
            }

            tracing::debug!(
                "Fetching page (limit={}, cursor={:?})",
                cursor.limit,
                cursor.token()
            );
            let page = match (state.fetch)(cursor.clone()).await {
                Ok(page) => page,
                Err(err) => return Some((Err(err), state)),
            };

            if page.has_more {
                match page.next_cursor {
                    Some(token) => state.next = Some(cursor.advance(token)),
                    None => {
                        state.pending_error = Some(Diagnostic::fatal(
                            DiagnosticCode::UnexpectedResponseFormat,
                            "list response has has_more=true but no continuation cursor",
                        ));
                    }
                }
            }
            state.buffer.extend(page.data);
        }
    })
}
