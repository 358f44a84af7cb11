use std::path::Path;

use mediatab_core::MediaTabError;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::links::LinkPatterns;

/// Embedded site database.
const EMBEDDED_DB: &str = include_str!("../data/sites.toml");

/// A music site and the path shapes of its resource pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteDef {
    /// Display name (e.g., "Spotify", "Bandcamp").
    pub name: String,
    /// Hosts served by the site. Subdomains match too.
    pub domains: Vec<String>,
    /// Regex matched against the pathname of track links.
    #[serde(default)]
    pub track_pattern: Option<String>,
    #[serde(default)]
    pub album_pattern: Option<String>,
    #[serde(default)]
    pub artist_pattern: Option<String>,
    /// Whether links are resolved on this site.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Wrapper for TOML deserialization.
#[derive(Debug, Deserialize)]
struct SiteDbFile {
    #[serde(rename = "site", default)]
    sites: Vec<SiteDef>,
}

/// Database of sites with known resource link shapes.
#[derive(Debug, Clone)]
pub struct SiteDatabase {
    sites: Vec<SiteDef>,
    compiled: Vec<LinkPatterns>,
}

impl SiteDatabase {
    /// Load the embedded site database.
    pub fn embedded() -> Self {
        Self::from_toml(EMBEDDED_DB).expect("embedded sites.toml should be valid")
    }

    /// Load a site database from a TOML string. Every pattern must compile.
    pub fn from_toml(toml_str: &str) -> Result<Self, MediaTabError> {
        let db: SiteDbFile =
            toml::from_str(toml_str).map_err(|e| MediaTabError::Config(e.to_string()))?;
        let compiled = db
            .sites
            .iter()
            .map(compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            sites: db.sites,
            compiled,
        })
    }

    /// Load a site database from a TOML file.
    pub fn load(path: &Path) -> Result<Self, MediaTabError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Merge a user database into this one.
    /// Sites with matching names are replaced; new sites are appended.
    pub fn merge_user(&mut self, user_db: &SiteDatabase) {
        for (i, user_site) in user_db.sites.iter().enumerate() {
            if let Some(pos) = self.sites.iter().position(|s| s.name == user_site.name) {
                self.sites[pos] = user_site.clone();
                self.compiled[pos] = user_db.compiled[i].clone();
            } else {
                self.sites.push(user_site.clone());
                self.compiled.push(user_db.compiled[i].clone());
            }
        }
    }

    /// Find the first enabled site serving `host`, exactly or as a subdomain.
    pub fn find_by_host(&self, host: &str) -> Option<usize> {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.sites.iter().position(|site| {
            site.enabled
                && site.domains.iter().any(|domain| {
                    let domain = domain.to_ascii_lowercase();
                    host == domain || host.ends_with(&format!(".{domain}"))
                })
        })
    }

    /// Link patterns for `host`. Unknown hosts get empty patterns.
    pub fn patterns_for_host(&self, host: &str) -> LinkPatterns {
        self.find_by_host(host)
            .and_then(|i| self.compiled.get(i).cloned())
            .unwrap_or_default()
    }

    /// Get the site name for a matched index.
    pub fn service_name(&self, index: usize) -> Option<&str> {
        self.sites.get(index).map(|s| s.name.as_str())
    }

    /// Get the site definition for a matched index.
    pub fn site(&self, index: usize) -> Option<&SiteDef> {
        self.sites.get(index)
    }

    /// Number of site definitions.
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether the database is empty.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

impl Default for SiteDatabase {
    fn default() -> Self {
        Self::embedded()
    }
}

fn compile(site: &SiteDef) -> Result<LinkPatterns, MediaTabError> {
    let pattern = |field: &'static str, source: &Option<String>| -> Result<Option<Regex>, MediaTabError> {
        source
            .as_deref()
            .map(|p| {
                Regex::new(p).map_err(|e| MediaTabError::InvalidPattern {
                    site: site.name.clone(),
                    field,
                    message: e.to_string(),
                })
            })
            .transpose()
    };
    Ok(LinkPatterns {
        track: pattern("track", &site.track_pattern)?,
        album: pattern("album", &site.album_pattern)?,
        artist: pattern("artist", &site.artist_pattern)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_loads() {
        let db = SiteDatabase::embedded();
        assert_eq!(db.len(), 6, "Expected 6 sites, got {}", db.len());
    }

    #[test]
    fn test_find_by_host_exact_and_subdomain() {
        let db = SiteDatabase::embedded();
        let idx = db.find_by_host("open.spotify.com").unwrap();
        assert_eq!(db.service_name(idx).unwrap(), "Spotify");

        let idx = db.find_by_host("someartist.bandcamp.com").unwrap();
        assert_eq!(db.service_name(idx).unwrap(), "Bandcamp");

        let idx = db.find_by_host("WWW.Deezer.com").unwrap();
        assert_eq!(db.service_name(idx).unwrap(), "Deezer");
        assert_eq!(db.site(idx).unwrap().domains, vec!["deezer.com".to_string()]);
    }

    #[test]
    fn test_unknown_host_has_empty_patterns() {
        let db = SiteDatabase::embedded();
        assert!(db.find_by_host("notspotify.com").is_none());
        assert!(db.patterns_for_host("example.com").is_empty());
    }

    #[test]
    fn test_spotify_patterns_match_paths() {
        let db = SiteDatabase::embedded();
        let patterns = db.patterns_for_host("open.spotify.com");
        assert!(patterns.track.unwrap().is_match("/track/4u7EnebtmKWzUH433cf5Qv"));
        assert!(patterns.artist.unwrap().is_match("/intl-de/artist/1dfeR4HaWDbWqFHLkxsg1d"));
        assert!(!patterns.album.unwrap().is_match("/playlist/37i9dQZF1DXcBWIGoYBM5M"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let toml = r#"
[[site]]
name = "Broken"
domains = ["broken.example"]
track_pattern = "(unclosed"
"#;
        let err = SiteDatabase::from_toml(toml).unwrap_err();
        assert!(matches!(
            err,
            MediaTabError::InvalidPattern { field: "track", .. }
        ));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = SiteDatabase::from_toml("[[site]]\nname = 3").unwrap_err();
        assert!(matches!(err, MediaTabError::Config(_)));
    }

    #[test]
    fn test_merge_user_replaces_and_appends() {
        let mut db = SiteDatabase::embedded();
        let user = SiteDatabase::from_toml(
            r#"
[[site]]
name = "Spotify"
domains = ["open.spotify.com"]
enabled = false

[[site]]
name = "Local Radio"
domains = ["radio.example"]
track_pattern = "^/song/"
"#,
        )
        .unwrap();
        db.merge_user(&user);

        assert_eq!(db.len(), 7);
        assert!(db.find_by_host("open.spotify.com").is_none());
        let patterns = db.patterns_for_host("live.radio.example");
        assert!(patterns.track.is_some());
        assert!(patterns.album.is_none());
    }
}
