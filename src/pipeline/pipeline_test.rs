// Integration tests for folder conversion: scan -> decode -> roles -> output

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::model::cursor::RoleSource;
    use crate::model::mapping::CursorMapping;
    use crate::model::role::CursorRole;
    use crate::pipeline::cursor_io::{
        CursorSource, SUMMARY_FILE_NAME, SchemeSummary, convert_folder, convert_listing, run,
        scan_cursor_dir, write_batch,
    };
    use crate::pipeline::wincur::ConversionOptions;
    use crate::pipeline::wincur::ani::tests::{build_ani, solid_icon};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    const SCHEME_INF: &str = "[Scheme.Reg]\r\n\
        HKCU,\"Control Panel\\Cursors\\Schemes\",\"%SCHEME_NAME%\",,\"%10%\\%CUR_DIR%\\%pointer%,,%10%\\%CUR_DIR%\\%work%,,,,,,%10%\\%CUR_DIR%\\%vert%,,,,,,,,%10%\\%CUR_DIR%\\%person%\"\r\n\
        \r\n\
        [Strings]\r\n\
        CUR_DIR = \"Cursors\\Test\"\r\n\
        SCHEME_NAME = \"Test Scheme\"\r\n\
        pointer = \"Pointer.cur\"\r\n\
        work = \"Spinner.ani\"\r\n\
        vert = \"UpDown.cur\"\r\n\
        person = \"Person.cur\"\r\n";

    fn write_pack(dir: &Path, with_inf: bool) {
        fs::write(dir.join("Pointer.cur"), solid_icon(32, [255, 0, 0, 255], (0, 0))).unwrap();
        fs::write(dir.join("spinner.ANI"), build_ani(30, None, 3)).unwrap();
        fs::write(dir.join("UpDown.cur"), solid_icon(16, [0, 0, 255, 255], (8, 8))).unwrap();
        fs::write(dir.join("Normal.cur"), solid_icon(16, [0, 255, 0, 255], (1, 1))).unwrap();
        fs::write(dir.join("Broken.cur"), b"not a cursor").unwrap();
        fs::write(dir.join("readme.txt"), b"thanks for downloading").unwrap();
        if with_inf {
            fs::write(dir.join("Install.INF"), SCHEME_INF).unwrap();
        }
    }

    fn sequential() -> ConversionOptions {
        ConversionOptions::new().sequential()
    }

    #[test]
    fn test_folder_with_inf_uses_scheme_roles() {
        let dir = tempdir().unwrap();
        write_pack(dir.path(), true);

        let batch = convert_folder(dir.path(), &CursorMapping::default(), &sequential()).unwrap();

        assert_eq!(batch.role_source, RoleSource::Inf);
        let scheme = batch.inf_mapping.as_ref().unwrap();
        assert_eq!(scheme.scheme_name.as_deref(), Some("Test Scheme"));
        assert_eq!(scheme.len(), 4);

        let names: Vec<&str> = batch.cursors.iter().map(|c| c.file_name.as_str()).collect();
        assert_eq!(names, vec!["Normal.cur", "Pointer.cur", "UpDown.cur", "spinner.ANI"]);

        let roles = |name: &str| {
            batch
                .cursors
                .iter()
                .find(|c| c.file_name == name)
                .map(|c| (c.roles.clone(), c.inf_position))
                .unwrap()
        };
        assert_eq!(roles("Pointer.cur"), (vec![CursorRole::Arrow], Some(0)));
        assert_eq!(roles("spinner.ANI"), (vec![CursorRole::Wait], Some(2)));
        assert_eq!(
            roles("UpDown.cur"),
            (vec![CursorRole::ResizeNs, CursorRole::WindowNs], Some(8))
        );
        // Normal.cur is not part of the scheme, so the INF pass gives it nothing.
        assert_eq!(roles("Normal.cur"), (vec![], None));

        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].0, "Broken.cur");
    }

    #[test]
    fn test_folder_without_inf_falls_back_to_file_names() {
        let dir = tempdir().unwrap();
        write_pack(dir.path(), false);

        let batch = convert_folder(dir.path(), &CursorMapping::default(), &sequential()).unwrap();

        assert_eq!(batch.role_source, RoleSource::Filename);
        assert!(batch.inf_mapping.is_none());

        let normal = batch.cursors.iter().find(|c| c.file_name == "Normal.cur").unwrap();
        assert_eq!(normal.roles, vec![CursorRole::Arrow]);
        assert_eq!(normal.inf_position, None);

        let pointer = batch.cursors.iter().find(|c| c.file_name == "Pointer.cur").unwrap();
        assert!(pointer.roles.is_empty());
    }

    #[test]
    fn test_unusable_inf_falls_back_to_file_names() {
        let files = vec![
            CursorSource::new("Normal.cur", solid_icon(16, [0, 0, 0, 255], (0, 0))),
            CursorSource::new("Vertical.cur", solid_icon(16, [0, 0, 0, 255], (0, 0))),
        ];
        let inf = b"[Strings]\npointer = \"Normal.cur\"\n";

        let batch =
            convert_listing(&files, Some(&inf[..]), &CursorMapping::default(), &sequential());

        assert_eq!(batch.role_source, RoleSource::Filename);
        assert!(batch.inf_mapping.is_none());
        assert_eq!(
            batch.roles_covered(),
            vec![CursorRole::Arrow, CursorRole::ResizeNs, CursorRole::WindowNs]
        );
    }

    #[test]
    fn test_animated_cursor_is_limited_in_batch() {
        let dir = tempdir().unwrap();
        write_pack(dir.path(), true);

        let batch = convert_folder(dir.path(), &CursorMapping::default(), &sequential()).unwrap();
        let spinner = batch.cursors.iter().find(|c| c.file_name == "spinner.ANI").unwrap();

        assert_eq!(spinner.result.source_name, "spinner");
        assert_eq!(spinner.result.frame_count, 24);
        assert!((spinner.result.frame_duration - 0.05 * 30.0 / 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let files: Vec<CursorSource> = (0..12)
            .map(|i| {
                CursorSource::new(
                    format!("cursor{:02}.cur", i),
                    solid_icon(8, [i as u8, 0, 0, 255], (0, 0)),
                )
            })
            .collect();
        let mapping = CursorMapping::default();

        let parallel = convert_listing(&files, None, &mapping, &ConversionOptions::default());
        let serial = convert_listing(&files, None, &mapping, &sequential());

        let names = |batch: &crate::pipeline::cursor_io::ConversionBatch| {
            batch
                .cursors
                .iter()
                .map(|c| c.result.source_name.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&parallel), names(&serial));
        assert_eq!(names(&parallel)[0], "cursor00");
        assert_eq!(parallel.cursors.len(), 12);
    }

    #[test]
    fn test_content_sniffing_for_unknown_extension() {
        let files = vec![
            CursorSource::new("Busy", build_ani(2, None, 10)),
            CursorSource::new("notes.txt", b"hello".to_vec()),
        ];
        let batch = convert_listing(&files, None, &CursorMapping::default(), &sequential());

        assert_eq!(batch.cursors.len(), 1);
        assert_eq!(batch.cursors[0].roles, vec![CursorRole::Busy]);
        assert!(batch.skipped.is_empty());
    }

    #[test]
    fn test_write_batch_outputs() {
        let dir = tempdir().unwrap();
        let pack = dir.path().join("pack");
        let out = dir.path().join("out");
        fs::create_dir_all(&pack).unwrap();
        write_pack(&pack, true);

        let batch = convert_folder(&pack, &CursorMapping::default(), &sequential()).unwrap();
        let written = write_batch(&batch, &out).unwrap();

        assert_eq!(written.len(), batch.cursors.len() + 1);
        let sheet = image::open(out.join("spinner.png")).unwrap();
        assert_eq!((sheet.width(), sheet.height()), (4, 4 * 24));

        let summary = SchemeSummary::load_from_file(out.join(SUMMARY_FILE_NAME)).unwrap();
        assert_eq!(summary.scheme_name.as_deref(), Some("Test Scheme"));
        assert_eq!(summary.role_source, RoleSource::Inf);
        let updown = summary.cursors.iter().find(|c| c.name == "UpDown").unwrap();
        assert_eq!((updown.hotspot_x, updown.hotspot_y), (8, 8));
        assert_eq!(updown.sprite_sheet, "UpDown.png");
        assert_eq!(updown.roles, vec![CursorRole::ResizeNs, CursorRole::WindowNs]);
    }

    #[test]
    fn test_run_with_config() {
        let dir = tempdir().unwrap();
        let pack = dir.path().join("pack");
        fs::create_dir_all(&pack).unwrap();
        write_pack(&pack, false);

        let config = Config {
            input_dir: pack,
            output_dir: dir.path().join("sprites"),
            options: ConversionOptions::new().with_max_frames(10),
            thread_count: 2,
            role_table: None,
        };
        let batch = run(&config).unwrap();

        let spinner = batch.cursors.iter().find(|c| c.file_name == "spinner.ANI").unwrap();
        assert_eq!(spinner.result.frame_count, 10);
        assert!(config.output_dir.join("Normal.png").exists());
        assert!(config.output_dir.join(SUMMARY_FILE_NAME).exists());
    }

    #[test]
    fn test_missing_folder_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(convert_folder(&missing, &CursorMapping::default(), &sequential()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_cursor_is_skipped() {
        let dir = tempdir().unwrap();
        write_pack(dir.path(), true);
        std::os::unix::fs::symlink(dir.path().join("gone.cur"), dir.path().join("Bad.cur"))
            .unwrap();

        let listing = scan_cursor_dir(dir.path());
        assert_eq!(listing.unreadable.len(), 1);
        assert_eq!(listing.unreadable[0].0, "Bad.cur");

        let batch = convert_folder(dir.path(), &CursorMapping::default(), &sequential()).unwrap();
        assert_eq!(batch.role_source, RoleSource::Inf);
        assert_eq!(batch.cursors.len(), 4);
        let skipped: Vec<&str> = batch.skipped.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(skipped, vec!["Bad.cur", "Broken.cur"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_inf_falls_back_to_file_names() {
        let dir = tempdir().unwrap();
        write_pack(dir.path(), false);
        std::os::unix::fs::symlink(dir.path().join("gone.inf"), dir.path().join("install.inf"))
            .unwrap();

        let batch = convert_folder(dir.path(), &CursorMapping::default(), &sequential()).unwrap();

        assert_eq!(batch.role_source, RoleSource::Filename);
        assert!(batch.inf_mapping.is_none());
        let normal = batch.cursors.iter().find(|c| c.file_name == "Normal.cur").unwrap();
        assert_eq!(normal.roles, vec![CursorRole::Arrow]);
    }

    #[test]
    fn test_shared_stem_gets_distinct_sheets() {
        let dir = tempdir().unwrap();
        let files = vec![
            CursorSource::new("Busy.ani", build_ani(2, None, 10)),
            CursorSource::new("Busy.cur", solid_icon(8, [0, 0, 0, 255], (0, 0))),
            CursorSource::new("Help.cur", solid_icon(8, [0, 0, 0, 255], (0, 0))),
        ];
        let batch = convert_listing(&files, None, &CursorMapping::default(), &sequential());
        assert_eq!(batch.cursors.len(), 3);

        let written = write_batch(&batch, dir.path()).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["Busy.ani.png", "Busy.cur.png", "Help.png", SUMMARY_FILE_NAME]);
        for path in &written {
            assert!(path.exists());
        }

        let animated = image::open(dir.path().join("Busy.ani.png")).unwrap();
        assert_eq!((animated.width(), animated.height()), (4, 8));
        let still = image::open(dir.path().join("Busy.cur.png")).unwrap();
        assert_eq!((still.width(), still.height()), (8, 8));

        let summary = SchemeSummary::load_from_file(dir.path().join(SUMMARY_FILE_NAME)).unwrap();
        let sheets: Vec<&str> = summary.cursors.iter().map(|c| c.sprite_sheet.as_str()).collect();
        assert_eq!(sheets, vec!["Busy.ani.png", "Busy.cur.png", "Help.png"]);
    }
}
