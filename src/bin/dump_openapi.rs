use std::fs;

fn main() -> anyhow::Result<()> {
    // Generate the sanitized OpenAPI document the admin UI generator consumes.
    let doc = estate_office::docs::build_openapi(8000)?;
    let s = serde_json::to_string_pretty(&doc)?;
    let path = "/tmp/openapi-estate-office.json";
    fs::write(path, s)?;
    println!("wrote {}", path);
    Ok(())
}
