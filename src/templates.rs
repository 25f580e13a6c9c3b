use tera::Tera;

/// Builds the template set from the pages compiled into the binary.
pub fn load() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("base.html", include_str!("../templates/base.html")),
        ("portal.html", include_str!("../templates/portal.html")),
        ("admin_login.html", include_str!("../templates/admin_login.html")),
        ("admin.html", include_str!("../templates/admin.html")),
        ("emails.html", include_str!("../templates/emails.html")),
    ])?;
    Ok(tera)
}
