use std::env;
use std::process;

use domain::adapters::memory_repo::InMemoryRepo;
use domain::service::TriageService;
use domain::validate::PatientDraft;
use domain::CoreError;
use serde_json::Value;

fn print_usage() {
    eprintln!(
        "{}\n\nUsage:\n  domain add <name> <code> <severity> <waitTime> [<name> <code> <severity> <waitTime> ...]\n  domain wait <name> [--seed <name> <code> <severity> <waitTime>]...\n  domain list\n\nNotes:\n  - This demo CLI uses an in-memory repository; data is not persisted across runs.\n  - Commands run against a fresh store, so `wait` and `list` only see records\n    added in the same invocation via --seed.",
        domain::about()
    );
}

// Numbers on the command line become JSON numbers when they parse, otherwise
// strings, so the normal validation rules apply.
fn arg_value(s: &str) -> Value {
    serde_json::from_str::<serde_json::Number>(s)
        .map(Value::Number)
        .unwrap_or_else(|_| Value::String(s.to_string()))
}

fn draft_from(chunk: &[String]) -> PatientDraft {
    PatientDraft {
        name: chunk.first().map(|s| Value::String(s.clone())),
        code: chunk.get(1).map(|s| Value::String(s.clone())),
        severity: chunk.get(2).map(|s| arg_value(s)),
        wait_time: chunk.get(3).map(|s| arg_value(s)),
    }
}

async fn seed(svc: &TriageService<InMemoryRepo>, rows: &[String]) -> Result<(), String> {
    for chunk in rows.chunks(4) {
        match svc.add_patient(draft_from(chunk)).await {
            Ok(id) => println!("added: {} ({})", chunk[0], id),
            Err(e) => return Err(format!("add failed: {}", e)),
        }
    }
    Ok(())
}

async fn run() -> Result<(), String> {
    let mut args = env::args().skip(1); // skip program name

    let Some(cmd) = args.next() else {
        print_usage();
        return Ok(());
    };

    let svc = TriageService::new(InMemoryRepo::new());

    match cmd.as_str() {
        "add" => {
            let rest: Vec<String> = args.collect();
            if rest.is_empty() {
                return Err("missing <name> <code> <severity> <waitTime> for add".into());
            }
            seed(&svc, &rest).await
        }
        "wait" => {
            let Some(name) = args.next() else {
                return Err("missing <name> for wait".into());
            };
            let rest: Vec<String> = args.collect();
            let mut rows = Vec::new();
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--seed" => {
                        if i + 4 >= rest.len() {
                            return Err("--seed requires <name> <code> <severity> <waitTime>".into());
                        }
                        rows.extend_from_slice(&rest[i + 1..i + 5]);
                        i += 5;
                    }
                    unk => return Err(format!("unknown argument: {}", unk)),
                }
            }
            seed(&svc, &rows).await?;
            match svc.patient_wait_time(Some(&name)).await {
                Ok(wait) => {
                    println!("{}", wait);
                    Ok(())
                }
                Err(CoreError::NotFound) => Err("patient not found".into()),
                Err(e) => Err(format!("lookup failed: {}", e)),
            }
        }
        "list" => match svc.list_patients().await {
            Ok(patients) => {
                for p in patients {
                    println!("{}\t{}\t{}\t{}\t{}", p.id, p.name, p.code, p.severity, p.wait_time);
                }
                Ok(())
            }
            Err(CoreError::NotFound) => Err("no patients found".into()),
            Err(e) => Err(format!("list failed: {}", e)),
        },
        _ => {
            print_usage();
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(msg) = run().await {
        eprintln!("error: {}", msg);
        process::exit(1);
    }
}
