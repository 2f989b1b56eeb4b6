//! Share-destination archive for the host's Share menu.
//!
//! The file is a keyed archive of an export-media destination whose setting
//! carries an open-job action. The host runs the action after export, which
//! launches the configured app with the exported project.

use bpl_archive::{Archive, ArchiveResult, ClassDescriptor, KeyedArchiver, ObjectBuilder};
use bpl_types::Uid;
use uuid::Uuid;

use crate::config::DestinationConfig;

const DESTINATION_TYPE: &str = "Export Media";
const SETTING_NAME: &str = "ExportMovieRoles";
const SETTING_DESCRIPTION: &str = "Export a movie in the same format as the original project";
const STOMP_SETTING_KEY: &str = "CKStompSetting";
const STOMP_ENABLED_KEY: &str = "CKStompSettingEnabled";

/// A fresh destination identifier in the upper-case form the host writes.
pub fn new_uuid() -> String {
    Uuid::new_v4().to_string().to_uppercase()
}

/// Build the destination archive. `$objects[1]` is the destination itself.
pub fn build(config: &DestinationConfig, uuid: &str) -> ArchiveResult<Archive> {
    let mut ar = KeyedArchiver::new();
    let root = ar.reserve();
    let kind = ar.archive_string(DESTINATION_TYPE);
    let name = ar.archive_string(&config.name);
    let setting = ar.reserve();
    let setting_name = ar.archive_string(SETTING_NAME);
    let stomp_key = ar.archive_string(STOMP_SETTING_KEY);
    let enabled_key = ar.archive_string(STOMP_ENABLED_KEY);

    let stomp_xml = ar.archive_string(&stomp_setting_xml(&config.video_setting));
    let stomp_class = ar.class(&ClassDescriptor::new("Setting", ["NSObject"]));
    let yes = ar.archive_value(true);
    let stomp = ar.add(
        ObjectBuilder::new(stomp_class)
            .field("classVersion", 1u8)
            .field("container", Uid::NULL)
            .field("editable", true)
            .field("xml", stomp_xml),
    );

    let dict_class = ar.class(&ClassDescriptor::new(
        "NSMutableDictionary",
        ["NSDictionary", "NSObject"],
    ));
    let array_class = ar.class(&ClassDescriptor::new("NSArray", ["NSObject"]));
    let info = ar.dictionary(dict_class, &[(stomp_key, stomp), (enabled_key, yes)]);
    let settings_info = ar.array(array_class, &[info]);

    let job_xml = ar.archive_string(&open_job_action_xml(&config.app_path));
    let open_job_class = ar.class(&ClassDescriptor::new(
        "OpenJobAction",
        ["JobAction", "NSObject"],
    ));
    let action_class = ar.class(&ClassDescriptor::new(
        "CKOpenJobAction",
        ["CKJobAction", "CKAction", "NSObject"],
    ));
    let job_action = ar.add(ObjectBuilder::new(open_job_class).field("jobAction", job_xml));
    let action = ar.add(ObjectBuilder::new(action_class).field("jobAction", job_action));

    let description = ar.archive_string(SETTING_DESCRIPTION);
    let setting_class = ar.class(&ClassDescriptor::new(
        "CKMovieRolesSetting",
        ["CKSetting", "NSObject"],
    ));
    ar.fill(
        setting,
        ObjectBuilder::new(setting_class)
            .field("action", action)
            .field("description", description)
            .field("name", setting_name)
            .field("settingsInfo", settings_info)
            .field("shouldPerformPostProcessingAction", true)
            .field("version", 1u8),
    )?;

    let no = ar.archive_value(false);
    let resolution = ar.archive_string(&config.resolution);
    let uuid = ar.archive_string(uuid);
    let export_option = ar.archive_value(1u8);
    let video = ar.archive_string(&config.video_setting);
    let audio = ar.archive_string(&config.audio_setting);
    let destination_class = ar.class(&ClassDescriptor::new(
        "FFShareExportMediaDestination",
        ["FFShareDestination", "NSObject"],
    ));
    ar.fill(
        root,
        ObjectBuilder::new(destination_class)
            .field("exportOption", export_option)
            .field("FFShareDestinationVideoResolution", resolution)
            .field("includesChapterMarkers", yes)
            .field("jobActionUsesHelperApp", yes)
            .field("name", name)
            .field("selectedAudioStompSettingName", audio)
            .field("selectedRolePresetName", Uid::NULL)
            .field("selectedVideoStompSettingName", video)
            .field("setting", setting)
            .field("storepassword", no)
            .field("type", kind)
            .field("userHasChangedTheName", no)
            .field("uuid", uuid),
    )?;

    ar.finish(root)
}

/// Percent-encode everything except unreserved characters and `/`.
///
/// The host stores names and paths in its XML attributes this way, which
/// also keeps quotes and angle brackets out of the markup.
fn url_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(char::from(byte))
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn stomp_setting_xml(video_setting: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<setting name="{name}"><version>327680</version>"#,
            r#"<description>{description}</description>"#,
            r#"<default-destination></default-destination>"#,
            r#"<nameKey>ExportMovieNameKey</nameKey><descriptionKey>ExportMovieDescKey</descriptionKey>"#,
            r#"<encoder name="EUSSEncoder"><audio-encode isEnabled="no"/><video-encode isEnabled="no"/>"#,
            r#"<audio-video-encode isEnabled="no"/><file-extension>mov</file-extension>"#,
            r#"<job-can-be-segmented>no</job-can-be-segmented>"#,
            r#"<duration-change factor="100" new-duration="" source-at-output="no"/>"#,
            r#"<marker-image width="0" height="0"/><encode-cc>yes</encode-cc>"#,
            r#"<encode-chapters>yes</encode-chapters><family-name>USE_SOURCE_SETTINGS</family-name>"#,
            r#"</encoder><filter-set/></setting>"#,
        ),
        name = url_escape(video_setting),
        description = url_escape(SETTING_DESCRIPTION),
    )
}

fn open_job_action_xml(app_path: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<jobAction kind="open" name="Open" flags="1" job-count="1" default-title="" appName="{app}"/>"#,
        ),
        app = url_escape(app_path),
    )
}
