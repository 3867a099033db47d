use std::collections::HashMap;
use std::sync::Mutex;

use crate::client::MonitorClient;
use crate::error::Result;
use crate::model::TestInfo;
use crate::render::escape_html;

/// Content shown when a test run was saved without a description.
#[must_use]
pub fn no_description(trid: &str) -> String {
    format!("No description found for TestRun {trid}")
}

/// Inline description blocks keyed by test run id. An empty block is hidden.
#[derive(Debug, Default)]
pub struct InfoBlocks {
    blocks: HashMap<String, String>,
}

impl InfoBlocks {
    #[must_use]
    pub fn content(&self, trid: &str) -> &str {
        self.blocks.get(trid).map_or("", String::as_str)
    }

    /// Show the description if the block is empty, otherwise hide it.
    pub fn toggle(&mut self, trid: &str, info: &TestInfo) -> &str {
        let block = self.blocks.entry(trid.to_string()).or_default();
        if block.is_empty() {
            *block = match info.description.as_deref().filter(|d| !d.is_empty()) {
                Some(description) => format!("<pre><code>{}</code></pre>", escape_html(description)),
                None => no_description(trid),
            };
        } else {
            block.clear();
        }
        block
    }
}

/// Fetches the run description on every click and flips the matching block.
#[derive(Debug)]
pub struct InfoToggle {
    client: MonitorClient,
    blocks: Mutex<InfoBlocks>,
}

impl InfoToggle {
    pub fn new(client: MonitorClient) -> Self {
        Self {
            client,
            blocks: Mutex::new(InfoBlocks::default()),
        }
    }

    pub async fn toggle(&self, trid: &str) -> Result<String> {
        let info = self.client.test_info(trid).await?;
        let mut blocks = self
            .blocks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(blocks.toggle(trid, &info).to_string())
    }

    #[must_use]
    pub fn content(&self, trid: &str) -> String {
        self.blocks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .content(trid)
            .to_string()
    }
}
