//! Search query derivation from video file names

use crate::matching::strip_extension;
use crate::protocol::codec::MethodCall;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Season/episode notations, tried in order at every position:
/// `s01e02`, `02s01`, `01e02`, `s01`, `ep02`, `season.1`, `episode.2`, `e02`
static EPISODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)s(?P<s1>\d+)e(?P<e1>\d+)|(?P<e2>\d+)s(?P<s2>\d+)|(?P<s3>\d+)e(?P<e3>\d+)|s(?P<s4>\d+)|ep(?P<e5>\d+)|season.(?P<s6>\d+)|episode.(?P<e7>\d+)|e(?P<e8>\d+)",
    )
    .expect("episode pattern is valid")
});

const SEASON_GROUPS: [&str; 4] = ["s1", "s2", "s3", "s4"];
const SEASON_WORD_GROUP: &str = "s6";
const EPISODE_GROUPS: [&str; 5] = ["e1", "e2", "e3", "e5", "e7"];
const EPISODE_LETTER_GROUP: &str = "e8";

/// Query sent to `SearchSubtitles`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// URL-encoded query text
    pub text: String,
    /// Season and episode, present only when both were found
    pub episode: Option<(u32, u32)>,
}

impl SearchQuery {
    /// Derive a query from a video file name
    ///
    /// Season and episode are captured independently while scanning matches
    /// left to right; the query becomes episode-scoped only when both were
    /// found, and then the matched notation is removed from the text.
    pub fn from_file_name(name: &str) -> Self {
        let stem = strip_extension(name);

        let mut season = None;
        let mut episode = None;
        for captures in EPISODE_PATTERN.captures_iter(stem) {
            if episode.is_none() {
                episode = first_number(&captures, &EPISODE_GROUPS, EPISODE_LETTER_GROUP);
            }
            if season.is_none() {
                season = first_number(&captures, &SEASON_GROUPS, SEASON_WORD_GROUP);
            }
            if season.is_some() && episode.is_some() {
                break;
            }
        }

        match (season, episode) {
            (Some(season), Some(episode)) => {
                let text = EPISODE_PATTERN.replace_all(stem, "");
                Self {
                    text: urlencoding::encode(&text).into_owned(),
                    episode: Some((season, episode)),
                }
            }
            _ => Self {
                text: urlencoding::encode(stem).into_owned(),
                episode: None,
            },
        }
    }

    pub fn is_episode(&self) -> bool {
        self.episode.is_some()
    }

    /// Build the search call for the given comma separated language ids
    pub fn to_call(&self, languages: &str) -> MethodCall {
        let call = MethodCall::new("SearchSubtitles")
            .named("query", self.text.clone())
            .named("sublanguageid", languages);

        match self.episode {
            Some((season, episode)) => call.named("season", season).named("episode", episode),
            None => call,
        }
    }
}

fn first_number(captures: &Captures<'_>, groups: &[&str], extra: &str) -> Option<u32> {
    groups
        .iter()
        .chain(std::iter::once(&extra))
        .find_map(|group| captures.name(group))
        .and_then(|m| m.as_str().parse().ok())
}
