//! Command-line argument parsing for Puffball.

use crate::dag::ContentHash;
use crate::forum::SortOrder;
use crate::Result;
use std::env;
use std::path::PathBuf;
use std::process;

/// Private keys and capa given on the command line.
#[derive(Debug, Default)]
pub struct KeyOptions {
    pub capa: Option<u32>,
    pub root_key: Option<String>,
    pub admin_key: Option<String>,
    pub default_key: Option<String>,
}

/// Options of the `list` command.
#[derive(Debug, Default)]
pub struct ListOptions {
    pub types: Vec<String>,
    pub tags: Vec<String>,
    pub users: Vec<String>,
    pub roots: bool,
    pub sort: SortOrder,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// Command-line interface commands
#[derive(Debug)]
pub enum Command {
    AddIdentity {
        username: String,
        keys: KeyOptions,
    },
    AddAlias {
        identity: String,
        alias: String,
        keys: KeyOptions,
    },
    ListIdentities,
    Switch {
        username: Option<String>,
    },
    RemoveIdentity {
        username: String,
    },
    SetPrimary {
        identity: String,
        alias: String,
    },
    SetPreference {
        key: String,
        value: String,
    },
    ExportIdentity {
        file: Option<PathBuf>,
    },
    Post {
        content_type: String,
        content: String,
        parents: Vec<ContentHash>,
        tags: Vec<String>,
    },
    List(ListOptions),
    Render {
        sig: ContentHash,
        table: bool,
    },
    Flag {
        sig: ContentHash,
    },
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn value_after<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value.as_str(),
        None => fail(&format!("{} requires a value", flag)),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, flag: &str) -> T {
    value
        .parse()
        .unwrap_or_else(|_| fail(&format!("{} expects a number, got '{}'", flag, value)))
}

fn parse_sig(value: &str) -> Result<ContentHash> {
    value.parse()
}

fn parse_key_options(args: &[String]) -> KeyOptions {
    let mut keys = KeyOptions::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--capa" => keys.capa = Some(parse_number(value_after(args, i, flag), flag)),
            "--root-key" => keys.root_key = Some(value_after(args, i, flag).to_string()),
            "--admin-key" => keys.admin_key = Some(value_after(args, i, flag).to_string()),
            "--default-key" => keys.default_key = Some(value_after(args, i, flag).to_string()),
            other => fail(&format!("Unknown option '{}'", other)),
        }
        i += 2;
    }
    keys
}

fn parse_list_options(args: &[String]) -> ListOptions {
    let mut options = ListOptions::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--roots" => {
                options.roots = true;
                i += 1;
                continue;
            }
            "--desc" => {
                options.sort = SortOrder::Desc;
                i += 1;
                continue;
            }
            "--type" => options.types.push(value_after(args, i, flag).to_string()),
            "--tag" => options.tags.push(value_after(args, i, flag).to_string()),
            "--user" => options.users.push(value_after(args, i, flag).to_string()),
            "--offset" => options.offset = parse_number(value_after(args, i, flag), flag),
            "--limit" => options.limit = Some(parse_number(value_after(args, i, flag), flag)),
            other => fail(&format!("Unknown option '{}'", other)),
        }
        i += 2;
    }
    options
}

/// Parse command line arguments into a Command
pub fn parse_args() -> Result<Command> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "add-identity" => {
            if args.len() < 3 {
                eprintln!("Error: add-identity requires a username");
                eprintln!("Usage: puffball add-identity <username> [--capa N] [--root-key K] [--admin-key K] [--default-key K]");
                process::exit(1);
            }
            Ok(Command::AddIdentity {
                username: args[2].clone(),
                keys: parse_key_options(&args[3..]),
            })
        }

        "add-alias" => {
            if args.len() < 4 {
                eprintln!("Error: add-alias requires an identity and an alias username");
                process::exit(1);
            }
            Ok(Command::AddAlias {
                identity: args[2].clone(),
                alias: args[3].clone(),
                keys: parse_key_options(&args[4..]),
            })
        }

        "list-identities" => Ok(Command::ListIdentities),

        "switch" => Ok(Command::Switch {
            username: args.get(2).cloned(),
        }),

        "remove-identity" => {
            if args.len() < 3 {
                eprintln!("Error: remove-identity requires a username");
                process::exit(1);
            }
            Ok(Command::RemoveIdentity {
                username: args[2].clone(),
            })
        }

        "set-primary" => {
            if args.len() < 4 {
                eprintln!("Error: set-primary requires an identity and an alias username");
                process::exit(1);
            }
            Ok(Command::SetPrimary {
                identity: args[2].clone(),
                alias: args[3].clone(),
            })
        }

        "set-pref" => {
            if args.len() < 4 {
                eprintln!("Error: set-pref requires a key and a value");
                process::exit(1);
            }
            Ok(Command::SetPreference {
                key: args[2].clone(),
                value: args[3].clone(),
            })
        }

        "export-identity" => Ok(Command::ExportIdentity {
            file: args.get(2).map(PathBuf::from),
        }),

        "post" => {
            if args.len() < 4 {
                eprintln!("Error: post requires a content type and content");
                eprintln!("Usage: puffball post <type> <content> [--parent SIG]... [--tag TAG]...");
                process::exit(1);
            }
            let mut parents = Vec::new();
            let mut tags = Vec::new();
            let rest = &args[4..];
            let mut i = 0;
            while i < rest.len() {
                let flag = rest[i].as_str();
                match flag {
                    "--parent" => parents.push(parse_sig(value_after(rest, i, flag))?),
                    "--tag" => tags.push(value_after(rest, i, flag).to_string()),
                    other => fail(&format!("Unknown option '{}'", other)),
                }
                i += 2;
            }
            Ok(Command::Post {
                content_type: args[2].clone(),
                content: args[3].clone(),
                parents,
                tags,
            })
        }

        "list" => Ok(Command::List(parse_list_options(&args[2..]))),

        "render" => {
            if args.len() < 3 {
                eprintln!("Error: render requires a puff sig");
                process::exit(1);
            }
            Ok(Command::Render {
                sig: parse_sig(&args[2])?,
                table: args.get(3).map_or(false, |a| a == "--table"),
            })
        }

        "flag" => {
            if args.len() < 3 {
                eprintln!("Error: flag requires a puff sig");
                process::exit(1);
            }
            Ok(Command::Flag {
                sig: parse_sig(&args[2])?,
            })
        }

        _ => {
            eprintln!("Error: Unknown command '{}'", args[1]);
            print_usage();
            process::exit(1);
        }
    }
}

/// Print usage information
pub fn print_usage() {
    println!("Puffball - identities and forum puffs");
    println!("=====================================");
    println!();
    println!("Usage: puffball <command> [args...]");
    println!();
    println!("Identity commands:");
    println!("  add-identity <username> [key options]           Add an identity with its primary alias");
    println!("  add-alias <identity> <alias> [key options]      Add an alias to an identity");
    println!("  list-identities                                 List identities and aliases");
    println!("  switch [username]                               Switch identity (no name signs out)");
    println!("  remove-identity <username>                      Remove an identity");
    println!("  set-primary <identity> <alias>                  Make an alias the primary");
    println!("  set-pref <key> <json>                           Set a preference on the active identity");
    println!("  export-identity [file]                          Export the active identity");
    println!();
    println!("Forum commands:");
    println!("  post <type> <content> [--parent SIG]... [--tag TAG]...");
    println!("  list [--type T] [--tag T] [--user U] [--roots] [--desc] [--offset N] [--limit N]");
    println!("  render <sig> [--table]                          Render a puff's content");
    println!("  flag <sig>                                      Flag a puff (needs an admin key)");
    println!();
    println!("Key options:");
    println!("  --capa N  --root-key K  --admin-key K  --default-key K");
    println!();
    println!("Environment:");
    println!("  PUFFBALL_DIR   data directory (default ~/.puffball)");
    println!("  RUST_LOG       log filter (default puffball=info)");
    println!();
    println!("Examples:");
    println!("  puffball add-identity alice --default-key s3cret --admin-key adm1n");
    println!("  puffball switch alice");
    println!("  puffball post text 'hello world' --tag intro");
    println!("  puffball list --tag intro --desc --limit 10");
}
