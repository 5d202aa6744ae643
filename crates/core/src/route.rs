use thiserror::Error;
use vizwire_protocol::Viz;

use crate::store::MessageStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("no record at index {index} ({len} received)")]
    OutOfBounds { index: usize, len: usize },
    #[error("`{0}` is not a record index")]
    InvalidIndex(String),
}

/// The two views of the client: the dashboard and a full-screen record.
///
/// Paths follow the web front-end: `/dashboard`, `/plot/<index>`, and any
/// other path (including `/`) lands on `/plot/0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Dashboard,
    Record(usize),
    /// `/plot/<segment>` where the segment is not an index.
    InvalidRecord(String),
}

/// A route resolved against the current store contents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    Dashboard(&'a [Viz]),
    Record { index: usize, viz: &'a Viz },
}

impl Route {
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            ["dashboard"] => Route::Dashboard,
            ["plot", index] => index
                .parse()
                .map_or_else(|_| Route::InvalidRecord((*index).to_string()), Route::Record),
            _ => Route::Record(0),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Dashboard => "/dashboard".to_string(),
            Route::Record(index) => format!("/plot/{index}"),
            Route::InvalidRecord(segment) => format!("/plot/{segment}"),
        }
    }

    /// Look the route up in `store`. Bounds are checked against the store as
    /// it is now; a route that resolved earlier may stop resolving after a
    /// clear.
    pub fn resolve<'a>(&self, store: &'a MessageStore) -> Result<Resolved<'a>, RoutingError> {
        match self {
            Route::Dashboard => Ok(Resolved::Dashboard(store.records())),
            Route::Record(index) => store
                .get(*index)
                .map(|viz| Resolved::Record { index: *index, viz })
                .ok_or(RoutingError::OutOfBounds {
                    index: *index,
                    len: store.len(),
                }),
            Route::InvalidRecord(segment) => Err(RoutingError::InvalidIndex(segment.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_paths() {
        assert_eq!(Route::parse("/dashboard"), Route::Dashboard);
        assert_eq!(Route::parse("/dashboard/?ws=ws://x"), Route::Dashboard);
        assert_eq!(Route::parse("/plot/3"), Route::Record(3));
        assert_eq!(Route::parse("/plot/abc"), Route::InvalidRecord("abc".into()));
        assert_eq!(Route::parse("/plot/-1"), Route::InvalidRecord("-1".into()));
    }

    #[test]
    fn unknown_paths_land_on_first_record() {
        assert_eq!(Route::parse("/"), Route::Record(0));
        assert_eq!(Route::parse(""), Route::Record(0));
        assert_eq!(Route::parse("/settings/theme"), Route::Record(0));
    }

    #[test]
    fn path_round_trips() {
        for route in [Route::Dashboard, Route::Record(7)] {
            assert_eq!(Route::parse(&route.path()), route);
        }
    }

    #[test]
    fn resolve_checks_current_bounds() {
        let mut store = MessageStore::new();
        store.append(Viz::new("a"));
        store.append(Viz::new("b"));

        match Route::Record(1).resolve(&store) {
            Ok(Resolved::Record { index, viz }) => {
                assert_eq!(index, 1);
                assert_eq!(viz.name, "b");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            Route::Record(5).resolve(&store),
            Err(RoutingError::OutOfBounds { index: 5, len: 2 })
        );

        store.clear();
        assert!(Route::Record(1).resolve(&store).is_err());
        assert!(matches!(
            Route::Dashboard.resolve(&store),
            Ok(Resolved::Dashboard(records)) if records.is_empty()
        ));
        assert_eq!(
            Route::InvalidRecord("x".into()).resolve(&store),
            Err(RoutingError::InvalidIndex("x".into()))
        );
    }
}
