use std::fs;
use std::path::Path;

use serde_json::json;
use skier_core::{TaskFilter, TaskRegistry, load_pipeline};

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn site(root: &Path) {
    write(&root.join("partials/footer.html"), "<footer>{{ siteTitle }}</footer>");
    write(
        &root.join("content/template.html"),
        "<h1>{{ title }}</h1>{{ content | safe }}{% include \"footer.html\" %}",
    );
    write(
        &root.join("content/first.md"),
        "---\ntitle: First Post\ndate: 2024-01-05\n---\nHello **there**.",
    );
    write(
        &root.join("content/second.md"),
        "---\ntitle: Second Post\ndate: 2024-02-10\n---\nAgain.",
    );
    write(
        &root.join("templates/blog.html"),
        "{% for post in items %}<a href=\"{{ post.renderedLink | safe }}\">{{ post.title }}</a>{% endfor %}\
         |{{ pagination.currentPage }}/{{ pagination.totalPages }}",
    );

    let pipeline = format!(
        r#"
[globals]
siteTitle = "Skier"

[[task]]
kind = "prepare-output"
outDir = '{root}/public'

[[task]]
kind = "generate-items"
name = "posts"
itemsDir = '{root}/content'
partialsDir = '{root}/partials'
outDir = '{root}/public'
outputVar = "posts"

[[task]]
kind = "generate-paginated-items"
name = "blog-index"
dataVar = "${{posts}}"
itemsPerPage = 1
template = '{root}/templates/blog.html'
partialsDir = '{root}/partials'
outDir = '{root}/public'
basePath = "blog"

[[task]]
kind = "generate-feed"
articles = "${{posts}}"
outDir = '{root}/public'
site = {{ title = "Skier", link = "https://example.com" }}

[[task]]
kind = "generate-sitemap"
scanDir = '{root}/public'
outDir = '{root}/public'
siteUrl = "https://example.com"
"#,
        root = root.display()
    );
    write(&root.join("skier.toml"), &pipeline);
}

#[test]
fn builds_a_blog_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    site(root);

    let registry = TaskRegistry::builtin();
    let (mut context, pipeline) = load_pipeline(root.join("skier.toml"), &registry).unwrap();
    assert_eq!(
        pipeline.task_names(),
        vec!["prepare-output", "posts", "blog-index", "generate-feed", "generate-sitemap"]
    );

    let reports = pipeline.run(&mut context).unwrap();
    assert_eq!(reports.len(), 5);

    let public = root.join("public");
    let first = fs::read_to_string(public.join("first.html")).unwrap();
    assert!(first.starts_with("<h1>First Post</h1>"));
    assert!(first.contains("<strong>there</strong>"));
    assert!(first.ends_with("<footer>Skier</footer>"));

    let posts = context.get("posts").unwrap().as_array().unwrap();
    let titles: Vec<_> = posts.iter().map(|p| p["title"].clone()).collect();
    assert_eq!(titles, vec![json!("Second Post"), json!("First Post")]);

    assert_eq!(
        fs::read_to_string(public.join("blog.html")).unwrap(),
        "<a href=\"/second.html\">Second Post</a>|1/2"
    );
    assert_eq!(
        fs::read_to_string(public.join("blog/page/2.html")).unwrap(),
        "<a href=\"/first.html\">First Post</a>|2/2"
    );

    let rss = fs::read_to_string(public.join("rss.xml")).unwrap();
    assert!(rss.contains("https://example.com/second.html"));
    assert!(public.join("atom.xml").exists());
    assert!(public.join("feed.json").exists());
    assert!(context.get("rssPath").is_some());

    let sitemap = fs::read_to_string(public.join("sitemap.xml")).unwrap();
    assert!(sitemap.contains("<loc>https://example.com/blog.html</loc>"));
    assert!(sitemap.contains("<loc>https://example.com/blog/page/2.html</loc>"));
    assert!(sitemap.contains("<loc>https://example.com/first.html</loc>"));
}

#[test]
fn skipped_tasks_do_not_run() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    site(root);

    let registry = TaskRegistry::builtin();
    let (mut context, pipeline) = load_pipeline(root.join("skier.toml"), &registry).unwrap();
    let pipeline = pipeline.filter(&TaskFilter::skip(["generate-feed", "generate-sitemap"]));
    pipeline.run(&mut context).unwrap();

    let public = root.join("public");
    assert!(public.join("blog.html").exists());
    assert!(!public.join("rss.xml").exists());
    assert!(!public.join("sitemap.xml").exists());
}

#[test]
fn a_failing_task_stops_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    site(root);
    fs::remove_file(root.join("templates/blog.html")).unwrap();

    let registry = TaskRegistry::builtin();
    let (mut context, pipeline) = load_pipeline(root.join("skier.toml"), &registry).unwrap();
    let err = pipeline.run(&mut context).unwrap_err();

    assert_eq!(err.task, "blog-index");
    assert!(err.to_string().starts_with("[skier/blog-index]"));
    assert!(!root.join("public/rss.xml").exists());
}
