//! Library integration tests.

use preflight::PreflightError;

#[test]
fn error_types_are_public() {
    let err = PreflightError::UnknownPrerequisite { id: "test".into() };
    assert!(err.to_string().contains("test"));
}

#[test]
fn result_type_alias_is_public() {
    fn test_fn() -> preflight::Result<()> {
        Ok(())
    }
    assert!(test_fn().is_ok());
}

#[test]
fn cli_types_are_public() {
    use clap::Parser;
    use preflight::cli::{Cli, Commands};

    let cli = Cli::parse_from(["preflight", "check", "--json"]);

    if let Some(Commands::Check(args)) = cli.command {
        assert!(args.json);
    } else {
        panic!("Expected Check command");
    }
}

#[test]
fn progress_sinks_accept_closures() {
    use preflight::progress::{ProgressSink, ProgressUnifier};
    use std::sync::{Arc, Mutex};

    let seen = Arc::new(Mutex::new(Vec::new()));
    let captured = seen.clone();
    let sink: Arc<dyn ProgressSink> = Arc::new(move |event: preflight::progress::ProgressEvent| {
        captured.lock().unwrap().push(event.progress);
    });

    let unifier = ProgressUnifier::new("check", sink);
    unifier.begin("start").unwrap();
    unifier.update(40, "halfway").unwrap();
    unifier.complete("done").unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![0, 40, 100]);
}

#[tokio::test]
async fn channel_sink_streams_events() {
    use preflight::progress::{ChannelSink, ProgressUnifier};
    use std::sync::Arc;

    let (sink, mut rx) = ChannelSink::new();
    let unifier = ProgressUnifier::new("install", Arc::new(sink));
    unifier.begin("Installing").unwrap();
    unifier.fail("broken").unwrap();
    drop(unifier);

    let first = rx.recv().await.unwrap();
    let last = rx.recv().await.unwrap();
    assert_eq!(first.progress, 0);
    assert_eq!(last.message, "broken");
    assert_eq!(last.progress, 0);
}
