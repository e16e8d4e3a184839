use std::collections::HashSet;
use std::path::Path;

/// Reusable name prefix for VMs cloned from a template image: the image
/// name up to the first `-` at or after the user pattern, falling back to
/// the file stem when no such dash exists.
pub fn name_template(source_name: &str, user_pattern: &str) -> String {
    if let Some(rest) = source_name.get(user_pattern.len()..)
        && let Some(pos) = rest.find('-')
    {
        return source_name[..user_pattern.len() + pos].to_string();
    }
    Path::new(source_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_name.to_string())
}

/// Lowest free `{template}-{n}` name, counting from 1.
pub fn next_free_name(template: &str, taken: &HashSet<String>) -> String {
    let mut num: u64 = 1;
    loop {
        let candidate = format!("{template}-{num}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        num += 1;
    }
}
