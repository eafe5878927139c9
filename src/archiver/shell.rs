//! Offline document shell wrapped around the archived article.

use crate::config::RenderingConfig;
use crate::extraction::ArticleDocument;
use crate::utils::escape_html;

const SHELL_STYLE: &str = r#"    <style>
        #page-content,
        #js_article_bottom_bar,
        .__page_content__ {
            max-width: 760px;
            margin: 0 auto;
        }
        img {
            max-width: 100%;
        }
        .sns_opr_btn::before {
            width: 16px;
            height: 16px;
            margin-right: 3px;
        }
    </style>
"#;

/// Serialize the article subtree and its trailing fragment into the index document
pub(crate) fn render(article: &ArticleDocument, title: &str, rendering: &RenderingConfig) -> String {
    let mut html = String::from(
        r#"<!DOCTYPE html>
<html lang="zh_CN">
<head>
    <meta charset="utf-8">
    <meta http-equiv="Content-Type" content="text/html; charset=utf-8">
    <meta http-equiv="X-UA-Compatible" content="IE=edge">
    <meta name="viewport" content="width=device-width,initial-scale=1.0,maximum-scale=1.0,user-scalable=0,viewport-fit=cover">
"#,
    );
    html.push_str(&format!("    <title>{}</title>\n", escape_html(title)));
    for href in &rendering.stylesheets {
        html.push_str(&format!(
            "    <link rel=\"stylesheet\" href=\"{}\">\n",
            escape_html(href)
        ));
    }
    html.push_str(SHELL_STYLE);
    html.push_str("</head>\n");
    html.push_str(&format!(
        "<body class=\"{}\">\n\n",
        escape_html(&article.body_classes.join(" "))
    ));
    html.push_str(&article.article.outer_html());
    html.push('\n');
    if let Some(bar) = &article.bottom_bar {
        html.push_str(&bar.outer_html());
    }
    html.push_str("\n</body>\n</html>");
    html
}
