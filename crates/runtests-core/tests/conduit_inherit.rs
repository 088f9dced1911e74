use runtests_core::{ConduitKind, LaunchOptions, ResultConduit, ResultSink};
use std::io::{BufRead, Write};

#[test]
fn test_path_sink_sees_child_output() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let sink = ResultSink::create_in(ConduitKind::Path, dir.path())?;

    // A second opener in the same process stands in for the worker.
    let mut writer = sink.conduit().clone().open_writer()?;
    writeln!(writer, r#"{{"test_name":"test_os"}}"#)?;
    writeln!(writer, r#"{{"test_name":"test_sys"}}"#)?;
    drop(writer);

    let content = sink.read_to_string()?;
    let names: Vec<&str> = content.lines().collect();
    assert_eq!(names.len(), 2);
    assert!(names[1].contains("test_sys"));
    Ok(())
}

#[test]
fn test_path_reader_streams_lines() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let conduit = ResultConduit::path(dir.path().join("results.json"));
    std::fs::write(dir.path().join("results.json"), "a\nb\n")?;

    let lines = conduit
        .open_reader()?
        .lines()
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(lines, ["a", "b"]);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_descriptor_survives_exec() -> anyhow::Result<()> {
    use std::process::Command;

    let sink = ResultSink::create(ConduitKind::Descriptor)?;
    let ResultConduit::Descriptor(fd) = *sink.conduit() else {
        anyhow::bail!("expected a descriptor conduit");
    };

    let mut options = LaunchOptions::default();
    sink.conduit().prepare_launch(&mut options)?;

    let mut command = Command::new("sh");
    command.arg("-c").arg(format!("echo from-child >> /dev/fd/{fd}"));
    options.apply(&mut command)?;

    let status = sink.conduit().inherit_during(|| -> anyhow::Result<_> {
        Ok(command.status()?)
    })?;
    assert!(status.success());
    assert_eq!(sink.read_to_string()?, "from-child\n");
    Ok(())
}
