use comrak::options::{ListStyleType, Options};

/// Comrak options shared by every render: GitHub-flavoured extensions with
/// single newlines rendered as hard breaks.
pub(crate) fn default_options() -> Options<'static> {
    let mut options = Options::default();
    configure_extensions(&mut options);
    options
}

fn configure_extensions(options: &mut Options<'static>) {
    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.tagfilter = false;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;

    let render = &mut options.render;
    render.hardbreaks = true;
    render.github_pre_lang = true;
    render.list_style = ListStyleType::Dash;
    // Raw HTML is kept so the sanitizer, not the parser, decides what survives.
    render.r#unsafe = true;
    render.sourcepos = false;
    render.gfm_quirks = true;
}
