use crate::config::Route;

/// Outcome of a successful route match: the winning route, the portion of
/// the path strictly after the prefix, and the path the forwarder should
/// use when composing the upstream URL.
#[derive(Debug)]
pub struct RouteMatchResult<'a> {
    pub route: &'a Route,
    pub remainder: String,
    pub downstream_path: String,
}

/// First-match-wins prefix matcher over a small ordered route table.
///
/// A linear scan is deliberate: the table is tiny and first-match
/// semantics are obvious from a straight iteration, unlike a routing tree.
pub struct RouteMatcher<'a> {
    routes: &'a [Route],
}

impl<'a> RouteMatcher<'a> {
    pub fn new(routes: &'a [Route]) -> Self {
        Self { routes }
    }

    /// Return the first route whose prefix segment-matches `path`, along
    /// with the computed remainder and downstream path.
    pub fn match_path(&self, path: &str) -> Option<RouteMatchResult<'a>> {
        for route in self.routes {
            if let Some(matched_len) = segment_match(path, &route.prefix) {
                let remainder = normalize_remainder(&path[matched_len..]);
                let downstream_path = if route.strip_prefix {
                    remainder.clone()
                } else {
                    path.to_string()
                };
                return Some(RouteMatchResult {
                    route,
                    remainder,
                    downstream_path,
                });
            }
        }
        None
    }

    /// Synthetic match against the single gRPC route (if one exists),
    /// treating `path` as already the downstream path. Used by the
    /// dispatcher's gRPC prefix fallback.
    pub fn match_grpc_fallback(&self, path: &str) -> Option<RouteMatchResult<'a>> {
        let route = self
            .routes
            .iter()
            .find(|r| r.kind == crate::config::RouteKind::Grpc)?;
        Some(RouteMatchResult {
            route,
            remainder: path.to_string(),
            downstream_path: path.to_string(),
        })
    }
}

/// Returns the byte length of `prefix` within `path` if `path` is either
/// exactly `prefix` or begins with `prefix` followed by `/`. Comparison is
/// case-insensitive.
fn segment_match(path: &str, prefix: &str) -> Option<usize> {
    if prefix == "/" {
        return Some(0);
    }
    let plen = prefix.len();
    if path.len() < plen {
        return None;
    }
    if !path.as_bytes()[..plen].eq_ignore_ascii_case(prefix.as_bytes()) {
        return None;
    }
    match path.as_bytes().get(plen) {
        None => Some(plen),
        Some(b'/') => Some(plen),
        _ => None,
    }
}

fn normalize_remainder(remainder: &str) -> String {
    if remainder.is_empty() {
        "/".to_string()
    } else {
        remainder.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteKind;

    fn routes() -> Vec<Route> {
        vec![
            Route::new("/grpc/", "grpc", RouteKind::Grpc, true),
            Route::new("/api/", "api", RouteKind::Http, false),
        ]
    }

    #[test]
    fn prefix_match_is_segment_bounded() {
        let table = routes();
        let matcher = RouteMatcher::new(&table);
        assert!(matcher.match_path("/apix").is_none());
        assert!(matcher.match_path("/api/x").is_some());
        assert!(matcher.match_path("/api").is_some());
    }

    #[test]
    fn first_match_wins() {
        let table = vec![
            Route::new("/a", "one", RouteKind::Http, false),
            Route::new("/a/b", "two", RouteKind::Http, false),
        ];
        let matcher = RouteMatcher::new(&table);
        let result = matcher.match_path("/a/b/x").unwrap();
        assert_eq!(result.route.cluster, "one");
    }

    #[test]
    fn matching_is_case_insensitive() {
        let table = routes();
        let matcher = RouteMatcher::new(&table);
        assert!(matcher.match_path("/API/hello").is_some());
    }

    #[test]
    fn remainder_is_normalized_when_empty() {
        let table = routes();
        let matcher = RouteMatcher::new(&table);
        let result = matcher.match_path("/api").unwrap();
        assert_eq!(result.remainder, "/");
    }

    #[test]
    fn strip_prefix_controls_downstream_path() {
        let table = routes();
        let matcher = RouteMatcher::new(&table);

        let grpc = matcher.match_path("/grpc/greet.Greeter/SayHello").unwrap();
        assert_eq!(grpc.downstream_path, "/greet.Greeter/SayHello");

        let api = matcher.match_path("/api/hello").unwrap();
        assert_eq!(api.downstream_path, "/api/hello");
    }

    #[test]
    fn grpc_fallback_uses_path_verbatim() {
        let table = routes();
        let matcher = RouteMatcher::new(&table);
        let result = matcher
            .match_grpc_fallback("/greet.Greeter/SayHello")
            .unwrap();
        assert_eq!(result.downstream_path, "/greet.Greeter/SayHello");
        assert_eq!(result.route.cluster, "grpc");
    }

    #[test]
    fn no_match_returns_none() {
        let table = routes();
        let matcher = RouteMatcher::new(&table);
        assert!(matcher.match_path("/nope").is_none());
    }
}
