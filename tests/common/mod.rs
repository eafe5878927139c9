//! Common test utilities for article-dl integration tests

use article_dl::Config;
use std::path::Path;
use std::time::Duration;

/// Config writing under `root` with fast retries and no pauses
pub fn test_config(root: &Path, relays: Vec<String>) -> Config {
    let mut config = Config::default();
    config.output.root = root.to_path_buf();
    config.fetch.relays = relays;
    config.fetch.upgrade_insecure = false;
    config.fetch.article_pause = Duration::ZERO;
    config.fetch.asset_timeout = Duration::from_secs(5);
    config.fetch.article_timeout = Duration::from_secs(5);
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(5);
    config.retry.jitter = false;
    config.rendering.publish_time_utc_offset_minutes = Some(480);
    config
}

/// Readable article page wrapping `content` in the usual containers
pub fn article_page(content: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><title>page</title></head>
<body class="zh_CN wx_wap_page">
<div id="js_article" class="rich_media">
  <em id="publish_time"></em>
  <span id="js_ip_wording_wrp" style="display: none;"><span id="js_ip_wording"></span></span>
  <div id="js_content" style="visibility: hidden;">{content}</div>
  <script>
    var oriCreateTime = '1700000000';
    window.ip_wording = {{
      countryName: '中国',
      countryId: '156',
      provinceName: '上海',
      cityName: ''
    }};
  </script>
</div>
<div id="js_article_bottom_bar"><span class="sns_opr_btn">like</span></div>
</body></html>"#
    )
}

/// Install a test subscriber honouring `RUST_LOG`; repeated calls are harmless
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
