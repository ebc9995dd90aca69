/// Makes a Figma layer name usable as a single file name. Layer names often
/// carry slash-separated component paths (`icons/arrow.left`); both `/` and
/// `.` become `_` so every asset lands directly in the output directory.
pub fn flatten_name(name: &str) -> String {
    name.replace(['/', '.'], "_")
}
