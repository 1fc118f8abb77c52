use std::io;

use serde_json::json;

use crate::config::EngineConfig;
use crate::data::roster::{load_roster, RosterFile};
use crate::data::saved_state::{NameIndex, SavedBufferState};
use crate::engine::allocation::ImmunityTargeting;
use crate::engine::buff::{BuffGroup, HideReason};
use crate::planner::{write_csv, BufferState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Catalog,
    Plan,
    Want,
    Migrate,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("catalog") => Some(Command::Catalog),
        Some("plan") => Some(Command::Plan),
        Some("want") => Some(Command::Want),
        Some("migrate") => Some(Command::Migrate),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    let Some(command) = parse_command(args) else {
        eprintln!("usage: bubblebuff <catalog|plan|want|migrate> <roster-file> [options]");
        return 2;
    };
    let options = match Options::parse(args.get(2..).unwrap_or_default()) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}");
            return 2;
        }
    };
    match command {
        Command::Catalog => handle_catalog(&options),
        Command::Plan => handle_plan(&options),
        Command::Want => handle_want(&options),
        Command::Migrate => handle_migrate(&options),
    }
}

#[derive(Debug, Default)]
struct Options {
    positional: Vec<String>,
    group: BuffGroup,
    csv: bool,
    remove: bool,
    settings: Option<String>,
    session: Option<String>,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut options = Options::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--csv" => options.csv = true,
                "--remove" => options.remove = true,
                "--group" => {
                    let value = iter.next().ok_or("--group needs a value")?;
                    options.group = value.parse()?;
                }
                "--settings" => {
                    options.settings = Some(iter.next().ok_or("--settings needs a value")?.clone());
                }
                "--session" => {
                    options.session = Some(iter.next().ok_or("--session needs a value")?.clone());
                }
                flag if flag.starts_with("--") => return Err(format!("unknown option '{flag}'")),
                _ => options.positional.push(arg.clone()),
            }
        }
        Ok(options)
    }

    fn config(&self) -> EngineConfig {
        EngineConfig::from_env()
            .with_overrides(self.settings.as_deref(), self.session.as_deref())
    }
}

fn load_roster_arg(options: &Options, usage: &str) -> Result<RosterFile, i32> {
    let Some(path) = options.positional.first() else {
        eprintln!("usage: {usage}");
        return Err(2);
    };
    load_roster(path).map_err(|err| {
        eprintln!("roster load failed: {err}");
        1
    })
}

/// Loads settings and runs a first pass over the party.
fn open_state(options: &Options, roster: &RosterFile) -> Result<BufferState, i32> {
    let mut state =
        BufferState::load_or_create(options.config().settings_path(), roster.known_characters());
    let targeting = ImmunityTargeting::new(&roster.party);
    match state.recalculate(&roster.party, &targeting, false) {
        Ok(_) => Ok(state),
        Err(err) => {
            eprintln!("allocation failed: {err}");
            Err(1)
        }
    }
}

fn print_json(value: &impl serde::Serialize, what: &str) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize {what}: {err}");
            1
        }
    }
}

fn handle_catalog(options: &Options) -> i32 {
    let roster = match load_roster_arg(options, "bubblebuff catalog <roster-file>") {
        Ok(roster) => roster,
        Err(code) => return code,
    };
    let state = match open_state(options, &roster) {
        Ok(state) => state,
        Err(code) => return code,
    };
    let pools = state.catalog().pools();
    let buffs: Vec<_> = state
        .buffs()
        .iter()
        .map(|buff| {
            let providers: Vec<_> = buff
                .providers()
                .iter()
                .map(|p| {
                    json!({
                        "caster": p.key,
                        "name": p.owner_name,
                        "source": p.source_name,
                        "spell": p.spell_name,
                        "availability": p.availability_label(pools),
                        "banned": p.banned,
                        "cap": p.custom_cap,
                    })
                })
                .collect();
            json!({
                "name": buff.name,
                "effect": buff.key,
                "category": buff.category,
                "group": buff.group,
                "mass": buff.is_mass,
                "short": buff.hide_because(HideReason::Short),
                "blacklisted": buff.hide_because(HideReason::Blacklisted),
                "requested": buff.requested(),
                "fulfilled": buff.fulfilled(),
                "providers": providers,
            })
        })
        .collect();
    let failures: Vec<_> = state
        .catalog()
        .failures()
        .iter()
        .map(|f| json!({ "character": f.character, "context": f.context, "error": f.error.to_string() }))
        .collect();
    print_json(&json!({ "buffs": buffs, "failures": failures }), "catalog")
}

fn handle_plan(options: &Options) -> i32 {
    let roster = match load_roster_arg(options, "bubblebuff plan <roster-file> [--group <g>] [--csv]") {
        Ok(roster) => roster,
        Err(code) => return code,
    };
    let state = match open_state(options, &roster) {
        Ok(state) => state,
        Err(code) => return code,
    };
    let plan = state.plan(options.group);
    if options.csv {
        if let Err(err) = write_csv(&plan, io::stdout().lock()) {
            eprintln!("failed to write plan csv: {err}");
            return 1;
        }
        return 0;
    }
    print_json(&plan, "plan")
}

fn handle_want(options: &Options) -> i32 {
    const USAGE: &str = "bubblebuff want <roster-file> <buff-name> <character-id|all> [--remove]";
    let (Some(buff_name), Some(who)) = (options.positional.get(1), options.positional.get(2)) else {
        eprintln!("usage: {USAGE}");
        return 2;
    };
    let roster = match load_roster_arg(options, USAGE) {
        Ok(roster) => roster,
        Err(code) => return code,
    };
    let mut state = match open_state(options, &roster) {
        Ok(state) => state,
        Err(code) => return code,
    };
    let Some(key) = state.catalog().find_by_name(buff_name).map(|b| b.key.clone()) else {
        eprintln!("no castable buff named '{buff_name}'");
        return 1;
    };
    let wants = !options.remove;
    let result = if who == "all" {
        state.set_all_wants(&key, wants).map(|_| ())
    } else {
        match roster.party.iter().position(|c| c.id.as_str() == who) {
            Some(index) => state.set_unit_wants(&key, index, wants).map(|_| ()),
            None => {
                eprintln!("'{who}' is not in the party");
                return 1;
            }
        }
    };
    let targeting = ImmunityTargeting::new(&roster.party);
    let outcome = result.and_then(|()| state.recalculate(&roster.party, &targeting, true));
    if let Err(err) = outcome {
        eprintln!("update failed: {err}");
        return 1;
    }
    match state.buff(&key) {
        Some(buff) => {
            println!(
                "{}: requested={}, fulfilled={}",
                buff.name,
                buff.requested(),
                buff.fulfilled()
            );
            0
        }
        None => 1,
    }
}

fn handle_migrate(options: &Options) -> i32 {
    let roster = match load_roster_arg(options, "bubblebuff migrate <roster-file>") {
        Ok(roster) => roster,
        Err(code) => return code,
    };
    let path = options.config().settings_path();
    let mut saved = match SavedBufferState::try_load(&path) {
        Ok(Some(saved)) => saved,
        Ok(None) => {
            eprintln!("no settings at '{}'", path.display());
            return 1;
        }
        Err(err) => {
            eprintln!("migration failed: {err}");
            return 1;
        }
    };
    let report = saved.migrate(&NameIndex::from_characters(roster.known_characters()));
    if let Err(err) = saved.save(&path) {
        eprintln!("migration failed: {err}");
        return 1;
    }
    println!(
        "migration complete: migrated={}, recovered={}, quarantined={}, pending={}",
        report.migrated,
        report.recovered,
        report.quarantined.len(),
        saved.unmigrated.len()
    );
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn options_split_flags_from_positionals() {
        let parsed = Options::parse(&args(&[
            "party.json",
            "--group",
            "important",
            "--csv",
            "--session",
            "s2",
        ]))
        .unwrap();
        assert_eq!(parsed.positional, vec!["party.json".to_string()]);
        assert_eq!(parsed.group, BuffGroup::Important);
        assert!(parsed.csv);
        assert_eq!(parsed.session.as_deref(), Some("s2"));
        assert!(Options::parse(&args(&["--group"])).is_err());
        assert!(Options::parse(&args(&["--bogus"])).is_err());
    }

    #[test]
    fn unknown_command_is_usage_error() {
        assert_eq!(parse_command(&args(&["bubblebuff", "serve"])), None);
        assert_eq!(run_with_args(&args(&["bubblebuff"])), 2);
        assert_eq!(run_with_args(&args(&["bubblebuff", "plan"])), 2);
    }
}
