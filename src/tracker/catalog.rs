use std::collections::BTreeSet;

use log::{debug, info};
use serde_yaml::Value;

use crate::error::Result;
use crate::models::TemplateSource;
use crate::providers::TemplateScanner;

/// Top-level keys that mark a YAML file as a pipeline template.
const TEMPLATE_MARKERS: [&str; 6] = ["stages", "extends", "jobs", "steps", "parameters", "variables"];

/// Resolves the set of cataloged template paths for `source`.
///
/// An explicit template path is taken as-is. Otherwise every scanned file
/// that parses as a YAML mapping with at least one template marker is kept.
pub async fn resolve_catalog<S>(scanner: &S, source: &TemplateSource) -> Result<BTreeSet<String>>
where
    S: TemplateScanner + ?Sized,
{
    if let Some(path) = &source.template_path {
        info!("catalog: using explicit template '{path}'");
        return Ok(BTreeSet::from([path.clone()]));
    }

    let files = scanner.scan(source).await?;
    let scanned = files.len();

    let templates: BTreeSet<String> = files
        .into_iter()
        .filter(|(path, content)| is_template(path, content))
        .map(|(path, _)| path)
        .collect();

    info!(
        "catalog: {} of {scanned} scanned files in {}/{} are templates",
        templates.len(),
        source.project,
        source.repository
    );
    Ok(templates)
}

fn is_template(path: &str, content: &str) -> bool {
    let value: Value = match serde_yaml::from_str(content) {
        Ok(value) => value,
        Err(e) => {
            debug!("catalog: skipping '{path}', invalid YAML: {e}");
            return false;
        }
    };

    let Some(mapping) = value.as_mapping() else {
        debug!("catalog: skipping '{path}', root is not a mapping");
        return false;
    };

    let has_marker = TEMPLATE_MARKERS.iter().any(|key| mapping.contains_key(*key));
    if !has_marker {
        debug!("catalog: skipping '{path}', no template keys");
    }
    has_marker
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StaticScanner(Vec<(&'static str, &'static str)>);

    #[async_trait]
    impl TemplateScanner for StaticScanner {
        async fn scan(&self, _source: &TemplateSource) -> Result<Vec<(String, String)>> {
            Ok(self
                .0
                .iter()
                .map(|(p, c)| ((*p).to_string(), (*c).to_string()))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_explicit_path_skips_scanning() {
        let scanner = StaticScanner(vec![("other.yaml", "steps: []")]);
        let source =
            TemplateSource::new("Lib", "tpl", "main", Some("build.yaml".into()), vec![]).unwrap();

        let catalog = resolve_catalog(&scanner, &source).await.unwrap();
        assert_eq!(catalog, BTreeSet::from(["build.yaml".to_string()]));
    }

    #[tokio::test]
    async fn test_scanned_files_are_filtered_by_shape() {
        let scanner = StaticScanner(vec![
            ("templates/build.yaml", "steps:\n- script: make\n"),
            ("templates/stage.yml", "parameters:\n- name: env\nstages: []\n"),
            ("templates/vars.yaml", "variables:\n  a: 1\n"),
            ("config/settings.yaml", "name: settings\nretries: 3\n"),
            ("templates/list.yaml", "- steps\n- jobs\n"),
            ("templates/broken.yaml", "steps: [unclosed\n"),
            ("templates/empty.yaml", ""),
        ]);
        let source = TemplateSource::new("Lib", "tpl", "main", None, vec![]).unwrap();

        let catalog = resolve_catalog(&scanner, &source).await.unwrap();
        assert_eq!(
            catalog.into_iter().collect::<Vec<_>>(),
            vec![
                "templates/build.yaml",
                "templates/stage.yml",
                "templates/vars.yaml"
            ]
        );
    }
}
