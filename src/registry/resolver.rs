use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::errors::RegistryError;
use crate::observability::messages::{
    registry::{CacheEntryInvalidated, ResolveSetCreatedMissingPath},
    StructuredLog,
};

use super::match_segment::{parse_match_identifier, MatchSegment};
use super::registry::{HierarchyListener, Registry, RegistryId};
use super::value::RegistryValue;

/// One matched `(owning registry, local key)` pair plus the full identifier it was
/// reached under, as produced by the resolution algorithm (§4.1).
#[derive(Clone)]
pub struct ResolvedEntry {
    pub registry: Arc<Registry>,
    pub key: String,
    pub full_identifier: String,
}

impl ResolvedEntry {
    pub fn value(&self) -> Option<RegistryValue> {
        self.registry.get(&self.key)
    }
}

/// A terminal prefix where resolution ran out of matching keys (§4.1 "Unmatched
/// terminal prefixes are also recorded separately"): the registry and segment level
/// at which the next segment had nothing to match, plus the dotted path reached so
/// far. [`RegistryResolver::resolve_set`] uses this to know where to start creating
/// missing intermediate registries.
#[derive(Clone)]
struct UnmatchedPrefix {
    registry: Arc<Registry>,
    level: usize,
    path_so_far: String,
}

#[derive(Clone)]
struct CacheEntry {
    results: Vec<ResolvedEntry>,
    referred_registries: HashSet<RegistryId>,
    unmatched_terminal_prefixes: Vec<UnmatchedPrefix>,
}

/// Binds to a root [`Registry`] and caches wildcard/tag resolutions, invalidating
/// lazily when a hierarchy-change notification reports a cached entry referred to
/// the replaced sub-registry (§4.1).
pub struct RegistryResolver {
    root: Arc<Registry>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    listener_registered_on: Mutex<HashSet<RegistryId>>,
}

impl RegistryResolver {
    pub fn new(root: Arc<Registry>) -> Arc<Self> {
        Arc::new(RegistryResolver {
            root,
            cache: Mutex::new(HashMap::new()),
            listener_registered_on: Mutex::new(HashSet::new()),
        })
    }

    pub fn root(&self) -> &Arc<Registry> {
        &self.root
    }

    /// Resolve a match identifier to its ordered list of matches, consulting (and
    /// populating) the cache.
    pub fn resolve(self: &Arc<Self>, match_identifier: &str) -> Result<Vec<ResolvedEntry>, RegistryError> {
        if let Some(entry) = self.cache.lock().unwrap().get(match_identifier) {
            return Ok(entry.results.clone());
        }

        let segments = parse_match_identifier(match_identifier)?;
        let (results, referred_objs, unmatched) = self.resolve_uncached(&segments);

        let cacheable = !results.is_empty()
            && !segments.last().map(MatchSegment::is_unrestricted_wildcard).unwrap_or(false);

        if cacheable {
            let mut referred_ids = HashSet::new();
            for registry in &referred_objs {
                referred_ids.insert(registry.id());
                self.register_as_listener_on(registry);
            }
            self.cache.lock().unwrap().insert(
                match_identifier.to_string(),
                CacheEntry {
                    results: results.clone(),
                    referred_registries: referred_ids,
                    unmatched_terminal_prefixes: unmatched,
                },
            );
        }

        Ok(results)
    }

    /// `resolve_get_single`: exactly the first match's value, or `NotFound`.
    pub fn resolve_get_single(self: &Arc<Self>, match_identifier: &str) -> Result<RegistryValue, RegistryError> {
        let results = self.resolve(match_identifier)?;
        results
            .into_iter()
            .find_map(|entry| entry.value())
            .ok_or_else(|| RegistryError::NotFound {
                match_identifier: match_identifier.to_string(),
            })
    }

    /// `resolve_set`: set `value` at `match_identifier`, creating missing
    /// intermediate registries along the way (§4.1 "Unmatched terminal prefixes are
    /// also recorded separately (for `resolve_set` with 'create if missing')").
    ///
    /// If the identifier already resolves, every matched entry is overwritten. If it
    /// doesn't, resolution will have stopped at some registry because the next
    /// literal segment had no matching key yet; `resolve_set` creates a child
    /// registry for each remaining literal segment but the last, then sets `value`
    /// under the final segment's key. A remaining segment that isn't a literal (a
    /// bare wildcard or tag predicate) can't be turned into a concrete key, so that
    /// case is rejected rather than guessed at.
    pub fn resolve_set(
        self: &Arc<Self>,
        match_identifier: &str,
        value: RegistryValue,
    ) -> Result<(), RegistryError> {
        let segments = parse_match_identifier(match_identifier)?;
        let (results, _referred, unmatched) = self.resolve_uncached(&segments);

        if !results.is_empty() {
            for entry in &results {
                entry.registry.set(entry.key.clone(), value.clone())?;
            }
            return Ok(());
        }

        let Some(prefix) = unmatched.into_iter().next() else {
            return Err(RegistryError::NotFound { match_identifier: match_identifier.to_string() });
        };

        // Validate before mutating anything: either every remaining segment is a
        // literal we can turn into a concrete key, or nothing gets created at all.
        if segments[prefix.level..].iter().any(|s| !matches!(s, MatchSegment::Literal(_))) {
            return Err(RegistryError::MalformedMatchIdentifier {
                identifier: match_identifier.to_string(),
                reason: "resolve_set cannot create a registry for a wildcard or tag-predicate segment",
            });
        }

        let from_path = prefix.path_so_far.clone();
        let mut current = prefix.registry;
        let mut value = Some(value);
        for (level, segment) in segments.iter().enumerate().skip(prefix.level) {
            let MatchSegment::Literal(key) = segment else {
                unreachable!("validated above: every remaining segment is a literal")
            };

            if level + 1 == segments.len() {
                current.set(key.clone(), value.take().expect("set once on the final segment"))?;
            } else {
                let child = Registry::new(Vec::<String>::new());
                child.set_parent(&current);
                current.set(key.clone(), RegistryValue::child(child.clone()))?;
                current = child;
            }
        }

        ResolveSetCreatedMissingPath { match_identifier, from_path: &from_path }.log();
        Ok(())
    }

    /// Shared resolution core: walks the tree from root, producing matches, the
    /// registries referred to along the way (for cache invalidation), and the
    /// terminal prefixes where matching ran dry. Never touches the cache itself.
    fn resolve_uncached(
        self: &Arc<Self>,
        segments: &[MatchSegment],
    ) -> (Vec<ResolvedEntry>, Vec<Arc<Registry>>, Vec<UnmatchedPrefix>) {
        let mut results = Vec::new();
        let mut referred_objs = vec![self.root.clone()];
        let mut unmatched = Vec::new();

        resolve_level(
            &self.root,
            segments,
            0,
            &mut String::new(),
            &mut results,
            &mut referred_objs,
            &mut unmatched,
        );

        (results, referred_objs, unmatched)
    }

    fn register_as_listener_on(self: &Arc<Self>, registry: &Arc<Registry>) {
        let mut registered = self.listener_registered_on.lock().unwrap();
        if registered.insert(registry.id()) {
            registry.add_hierarchy_listener(self.clone());
        }
    }
}

impl HierarchyListener for RegistryResolver {
    fn on_hierarchy_changed(
        &self,
        registry_id: RegistryId,
        _key: &str,
        _previous: Option<Arc<Registry>>,
        _new: Option<RegistryValue>,
    ) {
        let mut cache = self.cache.lock().unwrap();
        let stale: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| entry.referred_registries.contains(&registry_id))
            .map(|(id, _)| id.clone())
            .collect();
        for match_identifier in stale {
            cache.remove(&match_identifier);
            CacheEntryInvalidated { match_identifier: &match_identifier }.log();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn resolve_level(
    registry: &Arc<Registry>,
    segments: &[MatchSegment],
    level: usize,
    path_so_far: &mut String,
    results: &mut Vec<ResolvedEntry>,
    referred: &mut Vec<Arc<Registry>>,
    unmatched: &mut Vec<UnmatchedPrefix>,
) {
    let segment = &segments[level];
    let is_last = level + 1 == segments.len();
    let keys = registry.keys();

    let mut any_matched = false;
    for key in keys {
        if !segment.matches_key(&key) {
            continue;
        }
        let Some(value) = registry.get(&key) else { continue };

        if let MatchSegment::TaggedWildcard(tags) = segment {
            let ok = matches!(&value, RegistryValue::Child(child) if child.has_tags(tags));
            if !ok {
                continue;
            }
        }

        any_matched = true;
        let mut full_path = path_so_far.clone();
        if !full_path.is_empty() {
            full_path.push('.');
        }
        full_path.push_str(&key);

        if is_last {
            results.push(ResolvedEntry {
                registry: registry.clone(),
                key: key.clone(),
                full_identifier: full_path,
            });
        } else if let RegistryValue::Child(child) = &value {
            referred.push(registry.clone());
            let mut next_path = full_path;
            resolve_level(child, segments, level + 1, &mut next_path, results, referred, unmatched);
        }
    }

    if !any_matched {
        unmatched.push(UnmatchedPrefix {
            registry: registry.clone(),
            level,
            path_so_far: path_so_far.clone(),
        });
    }
}
