//! Turns grouped asset stubs into downloadable assets by asking the render
//! endpoint for image URLs, one request per group.

use thiserror::Error;

use crate::asset_name::flatten_name;
use crate::figma_api::{FigmaApiClient, RenderRequest};
use crate::group::{AssetGroups, AssetStub};

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAsset {
    pub stub: AssetStub,
    pub url: String,
}

impl ResolvedAsset {
    /// `<flattened name><suffix>.<format>`. Two assets with the same name,
    /// suffix and format collide and overwrite each other on disk.
    pub fn file_name(&self) -> String {
        format!(
            "{}{}.{}",
            flatten_name(&self.stub.name),
            self.stub.suffix,
            self.stub.format
        )
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("could not request image urls for {key}")]
    Request {
        key: String,
        source: anyhow::Error,
    },

    #[error("Figma could not render images for {key}:\n{message}")]
    Render { key: String, message: String },
}

/// Requests render URLs group by group, in group order. The first failing
/// group stops the whole resolution; no further requests are made.
///
/// Stubs the API returns no URL for are dropped with a warning.
pub async fn resolve_render_urls(
    client: &dyn FigmaApiClient,
    file_key: &str,
    groups: &AssetGroups,
) -> Result<Vec<ResolvedAsset>, ResolveError> {
    let mut assets = Vec::with_capacity(groups.stub_count());

    for group in groups.iter() {
        let key = group.key.to_string();

        // Every stub in a group shares its format and scale.
        let Some(first) = group.stubs.first() else {
            continue;
        };

        let request = RenderRequest {
            ids: group.ids(),
            format: first.format,
            scale: first.scale,
        };

        log::debug!("requesting {} image urls for {}", request.ids.len(), key);

        let response = client
            .get_image_urls(file_key, &request)
            .await
            .map_err(|source| ResolveError::Request {
                key: key.clone(),
                source,
            })?;

        if let Some(message) = response.err {
            return Err(ResolveError::Render { key, message });
        }

        for stub in &group.stubs {
            match response.url_for(&stub.id) {
                Some(url) => assets.push(ResolvedAsset {
                    stub: stub.clone(),
                    url: url.to_owned(),
                }),
                None => log::warn!(
                    "Figma returned no {} image for '{}' ({}), skipping it",
                    key,
                    stub.name,
                    stub.id
                ),
            }
        }
    }

    Ok(assets)
}

#[cfg(test)]
pub(crate) mod test {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use super::*;
    use crate::discover::{collect_exportable_nodes, resolve_root};
    use crate::document::{FigmaFile, ImageFormat};
    use crate::figma_api::RenderResponse;
    use crate::group::group_by_format;

    /// In-memory API: serves one document, renders every id whose format is
    /// not listed in `failing` with the urls in `urls`.
    #[derive(Default)]
    pub struct FakeClient {
        pub file: Option<FigmaFile>,
        pub urls: HashMap<String, String>,
        pub failing: HashMap<ImageFormat, String>,
        pub requests: Mutex<Vec<RenderRequest>>,
    }

    #[async_trait]
    impl FigmaApiClient for FakeClient {
        async fn get_file(&self, file_key: &str) -> Result<FigmaFile> {
            match &self.file {
                Some(file) => Ok(file.clone()),
                None => bail!("file {} not found", file_key),
            }
        }

        async fn get_image_urls(
            &self,
            _file_key: &str,
            request: &RenderRequest,
        ) -> Result<RenderResponse> {
            self.requests.lock().unwrap().push(request.clone());

            if let Some(message) = self.failing.get(&request.format) {
                return Ok(RenderResponse {
                    err: Some(message.clone()),
                    images: HashMap::new(),
                });
            }

            let images = request
                .ids
                .iter()
                .filter_map(|id| {
                    self.urls
                        .get(id)
                        .map(|url| (id.clone(), Some(format!("{}.{}", url, request.format))))
                })
                .collect();

            Ok(RenderResponse { err: None, images })
        }
    }

    pub fn icons_file() -> FigmaFile {
        FigmaFile::from_json(
            r#"{
                "name": "Icons",
                "schemaVersion": 0,
                "document": {
                    "id": "0:0",
                    "type": "DOCUMENT",
                    "children": [{
                        "id": "0:1",
                        "name": "Icons",
                        "type": "CANVAS",
                        "children": [
                            {"id": "1:1", "name": "home", "type": "COMPONENT",
                             "absoluteBoundingBox": {"x": 0, "y": 0, "width": 24, "height": 24},
                             "exportSettings": [{"format": "SVG"}]},
                            {"id": "1:2", "name": "a/b.c", "type": "COMPONENT",
                             "exportSettings": [{"format": "PNG", "constraint": {"type": "SCALE", "value": 2}}]}
                        ]
                    }]
                }
            }"#,
        )
        .unwrap()
    }

    fn urls(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(id, url)| (id.to_string(), url.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn resolves_icons_page() {
        let file = icons_file();
        let nodes = collect_exportable_nodes(resolve_root(&file.document, Some("Icons")));
        let groups = group_by_format(&nodes);
        assert_eq!(groups.keys().collect::<Vec<_>>(), ["svg1", "png2"]);

        let client = FakeClient {
            urls: urls(&[("1:1", "http://x/1"), ("1:2", "http://x/2")]),
            ..FakeClient::default()
        };

        let assets = resolve_render_urls(&client, "abc", &groups).await.unwrap();

        let names: Vec<_> = assets.iter().map(ResolvedAsset::file_name).collect();
        assert_eq!(names, ["home.svg", "a_b_c.png"]);
        assert_eq!(assets[0].url, "http://x/1.svg");
        assert_eq!(assets[1].url, "http://x/2.png");

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].format, ImageFormat::Png);
        assert_eq!(requests[1].scale, 2.0);
    }

    #[test]
    fn file_name_appends_suffix_before_extension() {
        let asset = ResolvedAsset {
            stub: AssetStub {
                id: "1:1".to_owned(),
                name: "icons/home".to_owned(),
                suffix: "@2x".to_owned(),
                format: ImageFormat::Png,
                scale: 2.0,
            },
            url: "http://x/1.png".to_owned(),
        };

        assert_eq!(asset.file_name(), "icons_home@2x.png");
    }

    #[tokio::test]
    async fn suffix_flows_from_export_settings_to_file_name() {
        let mut file = icons_file();
        file.document.children[0].children[0].export_settings[0].suffix = "@2x".to_owned();
        let nodes = collect_exportable_nodes(resolve_root(&file.document, Some("Icons")));
        let groups = group_by_format(&nodes);

        let client = FakeClient {
            urls: urls(&[("1:1", "http://x/1")]),
            ..FakeClient::default()
        };

        let assets = resolve_render_urls(&client, "abc", &groups).await.unwrap();

        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].file_name(), "home@2x.svg");
    }

    #[tokio::test]
    async fn drops_assets_without_url() {
        let file = icons_file();
        let nodes = collect_exportable_nodes(resolve_root(&file.document, None));
        let groups = group_by_format(&nodes);

        let client = FakeClient {
            urls: urls(&[("1:2", "http://x/2")]),
            ..FakeClient::default()
        };

        let assets = resolve_render_urls(&client, "abc", &groups).await.unwrap();

        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].stub.id, "1:2");
    }

    #[tokio::test]
    async fn render_error_stops_remaining_groups() {
        let file = icons_file();
        let nodes = collect_exportable_nodes(resolve_root(&file.document, None));
        let groups = group_by_format(&nodes);

        let mut failing = HashMap::new();
        failing.insert(ImageFormat::Svg, "rate limited".to_owned());
        let client = FakeClient {
            urls: urls(&[("1:1", "http://x/1"), ("1:2", "http://x/2")]),
            failing,
            ..FakeClient::default()
        };

        let err = resolve_render_urls(&client, "abc", &groups)
            .await
            .unwrap_err();

        match &err {
            ResolveError::Render { key, message } => {
                assert_eq!(key, "svg1");
                assert_eq!(message, "rate limited");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.to_string().ends_with("rate limited"));
        assert_eq!(client.requests.lock().unwrap().len(), 1);
    }
}
