use chiastat::{
    ir::{self, PrintConfig},
    runtime::{run_program, Reduction, RunConfig},
};
use datatest_stable::Utf8Path;

#[derive(thiserror::Error, Debug)]
#[error("error(s) occured in datatest at {0}")]
pub struct DatatestError(Box<Utf8Path>);

struct DatatestFile<'a> {
    errors: Vec<&'a str>,
    expected: Vec<&'a str>,
    source: String,
    comments: Vec<&'a str>,
}

// from https://matklad.github.io/2021/05/31/how-to-test.html
// DATATEST_EXPECT rewrites the fixture to match the current output instead of
// failing. Comments are kept, gathered at the top of the file.
fn stitch_to_datatest(
    errors: &[String],
    expected: &[String],
    source: &str,
    comments: &[&str],
) -> String {
    let mut lines = Vec::with_capacity(comments.len() + errors.len() + expected.len() + 3);
    lines.extend(comments.iter().copied());
    lines.extend(errors.iter().map(String::as_str));
    lines.push("---");
    lines.extend(expected.iter().map(String::as_str));
    lines.push("---");
    lines.push(source);
    let mut file = lines.join("\n");
    file.push('\n');
    file
}

fn read_datatest(test_contents: &str) -> DatatestFile {
    #[derive(PartialEq, Eq, Debug, Default)]
    enum Section {
        #[default]
        Error,
        Expected,
        Source,
    }

    let mut file = DatatestFile {
        errors: vec![],
        expected: vec![],
        source: String::new(),
        comments: vec![],
    };
    let mut section = Section::default();

    for line in test_contents.lines() {
        if line.trim_start().starts_with(';') && section != Section::Source {
            file.comments.push(line);
            continue;
        }
        match section {
            Section::Error if line.trim_end() == "---" => section = Section::Expected,
            Section::Error => file.errors.push(line),
            Section::Expected if line.trim_end() == "---" => section = Section::Source,
            Section::Expected => file.expected.push(line),
            Section::Source => {
                if !file.source.is_empty() {
                    file.source.push('\n');
                }
                file.source.push_str(line);
            }
        }
    }
    file
}

fn compare(
    path: &Utf8Path,
    file: &DatatestFile,
    errors: Vec<String>,
    expected: Vec<String>,
) -> datatest_stable::Result<()> {
    if std::env::var("DATATEST_EXPECT").is_ok() {
        std::fs::write(
            path,
            stitch_to_datatest(&errors, &expected, &file.source, &file.comments),
        )?;
        return Ok(());
    }

    let mut failed = false;
    for (name, want, got) in [
        ("errors", &file.errors, &errors),
        ("output", &file.expected, &expected),
    ] {
        let want = want.iter().map(|line| line.trim()).collect::<Vec<_>>();
        let got = got.iter().map(|line| line.trim()).collect::<Vec<_>>();
        if want != got {
            println!(
                "error in {path}: mismatched {name}\n\nGot:\n{}\n\nExpected:\n{}",
                got.join("\n"),
                want.join("\n")
            );
            failed = true;
        }
    }
    if failed {
        Err(DatatestError(Box::from(path)))?
    } else {
        Ok(())
    }
}

fn ir_parse_test(path: &Utf8Path, contents: String) -> datatest_stable::Result<()> {
    let file = read_datatest(&contents);
    let (errors, expected) = match ir::parse(&file.source) {
        Ok(value) => (
            vec![],
            vec![ir::display(&value, &PrintConfig::raw()).to_string()],
        ),
        Err(err) => (vec![err.to_string()], vec![]),
    };
    compare(path, &file, errors, expected)
}

fn eval_test(path: &Utf8Path, contents: String) -> datatest_stable::Result<()> {
    let file = read_datatest(&contents);
    let outcome = ir::parse_one_or_two(&file.source)
        .map_err(|err| format!("ir: {err}"))
        .and_then(|(program, args)| {
            run_program(&program, &args, &RunConfig::default()).map_err(|err| err.to_string())
        });
    let (errors, expected) = match outcome {
        Ok(Reduction { cost, value }) => (vec![], vec![format!("{cost} {value}")]),
        Err(err) => (vec![err], vec![]),
    };
    compare(path, &file, errors, expected)
}

datatest_stable::harness! {
    ir_parse_test, "test_data", r"^.*\.ird",
    eval_test, "test_data", r"^.*\.evd",
}
