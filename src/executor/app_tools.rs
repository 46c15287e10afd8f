//! Application-specific tables: which tool class serves the focused
//! application, and how `open_app` launches each known program.

/// Normalised application name → tool class.
pub const TOOL_TABLE: &[(&str, &str)] = &[
    ("libreoffice_calc", "CalcTools"),
    ("libreoffice_impress", "ImpressTools"),
    ("libreoffice_writer", "WriterTools"),
    ("code", "CodeTools"),
    ("vlc", "VLCTools"),
    ("google_chrome", "BrowserTools"),
];

const SESSION_BUS: &str = r#"export DBUS_SESSION_BUS_ADDRESS="unix:path=/run/user/1000/bus""#;

/// Lower-cased application name → launch command.
pub fn launch_command(app_name: &str) -> Option<String> {
    let cmd = match app_name.trim().to_lowercase().as_str() {
        "chrome" => "google-chrome --remote-debugging-port=1337".to_string(),
        "files" => "nautilus".to_string(),
        "terminal" => format!("{SESSION_BUS} && gnome-terminal"),
        "gedit" => "gedit".to_string(),
        "libreoffice writer" => "libreoffice --writer".to_string(),
        "libreoffice calc" => "libreoffice --calc".to_string(),
        "libreoffice impress" => "libreoffice --impress".to_string(),
        "settings" => format!("{SESSION_BUS} && gnome-control-center"),
        "vlc" => "vlc".to_string(),
        "gimp" => "gimp".to_string(),
        "vs code" => "code".to_string(),
        "thunderbird" => "thunderbird".to_string(),
        _ => return None,
    };
    Some(cmd)
}

/// Trim, lowercase, `-` → `_`.
pub fn normalize_app_name(name: &str) -> String {
    name.trim().to_lowercase().replace('-', "_")
}

/// The tool module name and class for the focused application, if it has one.
pub fn tool_for_app(cur_app: &str) -> Option<(&'static str, &'static str)> {
    let normalized = normalize_app_name(cur_app);
    TOOL_TABLE
        .iter()
        .find(|(name, _)| *name == normalized)
        .copied()
}

pub fn is_tool_class(namespace: &str) -> bool {
    TOOL_TABLE.iter().any(|(_, class)| *class == namespace)
}

/// Wrap a tool call so the tool module is imported and its result printed.
pub fn tool_command(code: &str, tool_name: &str) -> Option<String> {
    let (_, class) = TOOL_TABLE.iter().find(|(name, _)| *name == tool_name)?;
    Some(format!("from {tool_name} import *; {code}; {class}.print_result()"))
}
