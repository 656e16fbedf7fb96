//! Code change detection over a raw build log.
//!
//! The log of a source checkout ends with two redirected commands, the
//! checkout of the new revision and the listing of the previously built one:
//!
//! ```text
//!  > git checkout -f 4f2c9e1
//!  > git rev-list 9b0d3aa
//! ```
//!
//! The revision is read by word position in each statement, so any change in
//! the checkout tool's log format breaks detection. Callers that can get the
//! revisions from structured metadata should prefer that.

const CHECKOUT_REVISION_INDEX: usize = 3;
const REV_LIST_REVISION_INDEX: usize = 2;

/// Revisions compared by [`detect_code_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevisionPair<'a> {
    pub checkout: &'a str,
    pub previous: &'a str,
}

impl RevisionPair<'_> {
    pub fn differs(&self) -> bool {
        self.checkout != self.previous
    }
}

/// Extracts the checkout and rev-list revisions from the two trailing
/// `>`-delimited statements of `log`.
pub fn trailing_revisions(log: Option<&str>) -> Option<RevisionPair<'_>> {
    let log = log.filter(|log| !log.is_empty() && log.contains('>'))?;

    let mut statements: Vec<&str> = log.split('>').collect();
    while statements.last().is_some_and(|s| s.is_empty()) {
        statements.pop();
    }
    if statements.len() < 2 {
        return None;
    }

    let checkout = statements[statements.len() - 2].trim();
    let rev_list = statements[statements.len() - 1].trim();

    let checkout_words: Vec<&str> = checkout.split(' ').collect();
    let rev_list_words: Vec<&str> = rev_list.split(' ').collect();

    if checkout_words.len() <= CHECKOUT_REVISION_INDEX
        || rev_list_words.len() <= REV_LIST_REVISION_INDEX
    {
        return None;
    }

    Some(RevisionPair {
        checkout: checkout_words[CHECKOUT_REVISION_INDEX],
        previous: rev_list_words[REV_LIST_REVISION_INDEX],
    })
}

/// Returns `true` when the build log shows a checkout of a revision other
/// than the one listed for the previous build. Logs without enough structure
/// report no change.
pub fn detect_code_change(log: Option<&str>) -> bool {
    trailing_revisions(log).is_some_and(|pair| pair.differs())
}

/// Decides whether a build picked up new code.
pub trait ChangeDetector {
    fn code_changed(&self, log: Option<&str>) -> bool;
}

/// [`detect_code_change`] over the build log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHeuristic;

impl ChangeDetector for LogHeuristic {
    fn code_changed(&self, log: Option<&str>) -> bool {
        detect_code_change(log)
    }
}

impl<F> ChangeDetector for F
where
    F: Fn(Option<&str>) -> bool,
{
    fn code_changed(&self, log: Option<&str>) -> bool {
        self(log)
    }
}
