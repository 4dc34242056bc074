use std::fmt;

use regex::Regex;

use crate::error::{ReleaseToolError, Result};

pub const DEFAULT_REGISTRY: &str = "docker.io";
pub const DEFAULT_TAG: &str = "latest";

const DOCKER_HUB_API_HOST: &str = "registry-1.docker.io";
const PATH_COMPONENT_PATTERN: &str = r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$";
const TAG_PATTERN: &str = r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$";

/// A parsed `registry/repository:tag` image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    registry: String,
    repository: String,
    tag: String,
}

impl ImageReference {
    /// Parse an image reference
    ///
    /// The registry defaults to Docker Hub, where single-component
    /// repositories live under `library/`, and the tag defaults to `latest`.
    /// Digest references are rejected: images are pushed by tag.
    pub fn parse(input: &str) -> Result<Self> {
        let malformed = |reason: &str| ReleaseToolError::malformed_reference(input, reason);

        if input.is_empty() {
            return Err(malformed("reference is empty"));
        }
        if input.chars().any(char::is_whitespace) {
            return Err(malformed("reference contains whitespace"));
        }
        if input.contains('@') {
            return Err(malformed("digest references cannot be used as push targets"));
        }

        let last_slash = input.rfind('/').map_or(0, |i| i + 1);
        let (name, tag) = match input[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                (&input[..split], &input[split + 1..])
            }
            None => (input, DEFAULT_TAG),
        };

        let (registry, repository) = match name.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), rest.to_string())
            }
            _ => (DEFAULT_REGISTRY.to_string(), name.to_string()),
        };

        let repository = if registry == DEFAULT_REGISTRY && !repository.contains('/') {
            format!("library/{}", repository)
        } else {
            repository
        };

        let component = compile(PATH_COMPONENT_PATTERN)?;
        if repository.is_empty() || !repository.split('/').all(|c| component.is_match(c)) {
            return Err(malformed(
                "repository must be lowercase alphanumeric components separated by '/'",
            ));
        }
        validate_tag(tag).map_err(|reason| malformed(&reason))?;

        Ok(ImageReference {
            registry,
            repository,
            tag: tag.to_string(),
        })
    }

    /// The same registry and repository under another tag
    pub fn with_tag(&self, tag: &str) -> Result<Self> {
        validate_tag(tag).map_err(|reason| {
            ReleaseToolError::malformed_reference(format!("{}:{}", self.name(), tag), reason)
        })?;

        Ok(ImageReference {
            tag: tag.to_string(),
            ..self.clone()
        })
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// `registry/repository` without the tag
    pub fn name(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// Host (and port) serving the distribution API
    pub fn api_host(&self) -> &str {
        if self.registry == DEFAULT_REGISTRY {
            DOCKER_HUB_API_HOST
        } else {
            &self.registry
        }
    }

    /// True for registries on the loopback interface, which are spoken to
    /// over plain HTTP
    pub fn is_loopback(&self) -> bool {
        let host = if self.registry.starts_with('[') {
            self.registry
                .split_once(']')
                .map_or(self.registry.as_str(), |(h, _)| h)
                .trim_start_matches('[')
        } else {
            self.registry
                .split_once(':')
                .map_or(self.registry.as_str(), |(h, _)| h)
        };

        matches!(host, "localhost" | "127.0.0.1" | "::1")
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ReleaseToolError::config(format!("Invalid pattern: {}", e)))
}

fn validate_tag(tag: &str) -> std::result::Result<(), String> {
    let re = compile(TAG_PATTERN).map_err(|e| e.to_string())?;
    if re.is_match(tag) {
        Ok(())
    } else {
        Err(format!("invalid tag '{}'", tag))
    }
}
