//! # serpent demo application
//!
//! A small CLI wired up with serpent to exercise flags, config files,
//! environment variables and tagged logging by hand.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example serpent_demo -- greet
//! cargo run --example serpent_demo -- greet --count 3 --name you
//! cargo run --example serpent_demo -- serve --logtags net
//! ```
//!
//! ## Features demonstrated
//!
//! | Feature               | How to exercise it                                             |
//! |-----------------------|----------------------------------------------------------------|
//! | Flag defaults         | `greet`                                                        |
//! | Local flags           | `greet --count 3`                                              |
//! | Implied values        | `greet --loud` or `greet --loud=false`                         |
//! | Persistent flags      | `serve --dry-run`, declared on the root                        |
//! | Config file           | Create `config.toml` with `name = "file"` in cwd, then `greet` |
//! | Named config file     | `greet --config other` reads `other.toml` or `other.json`      |
//! | Env var override      | `SERPENT_DEMO_NAME=env cargo run --example serpent_demo -- greet` |
//! | Tagged logging        | `serve --logtags net`, or `serve --logalltags`                 |
//! | Verbose-only lines    | `serve -v`                                                     |
//! | Log file              | `serve --log /tmp/demo.log`; debug lines land in the file      |
//! | Positional args       | `show a b c`                                                   |

mod config;

use serpent::{
    BoolFlag, Command, Config, Int32Flag, Invocation, Opts, SerpentError, StringFlag, Uint16Flag,
};

use config::DemoConfig;

fn greet(inv: &Invocation<'_>) -> Result<(), SerpentError> {
    let cfg: DemoConfig = inv.store().extract()?;
    let loud = inv.store().get_bool("loud");
    for _ in 0..cfg.count {
        let line = format!("hello, {}", cfg.name);
        if loud {
            println!("{}!", line.to_uppercase());
        } else {
            println!("{line}");
        }
    }
    inv.logger()
        .with_field("count", cfg.count)
        .log("greeted");
    Ok(())
}

fn serve(inv: &Invocation<'_>) -> Result<(), SerpentError> {
    let cfg: DemoConfig = inv.store().extract()?;
    let log = inv.logger();
    let port = inv.store().get_u16("port");
    let net = log.tag("net").add("host", &cfg.server.host).add("port", port);

    log.out_v(format_args!("config files: {:?}", inv.store().config_files()));
    if inv.store().get_bool("dry-run") {
        net.out("would listen");
        return Ok(());
    }
    net.out("listening");
    net.with_field("peer", "10.0.0.7:51234").log("accepted");
    log.tag("db").log("pool ready");
    Ok(())
}

fn show(inv: &Invocation<'_>) -> Result<(), SerpentError> {
    for (i, arg) in inv.args().iter().enumerate() {
        println!("{i}: {arg}");
    }
    Ok(())
}

fn build() -> Result<serpent::App, SerpentError> {
    let cfg = Config::new("serpent-demo").env_prefix("SERPENT_DEMO");
    let mut app = serpent::init("serpent-demo", cfg)?;

    app.root_mut()
        .add_flag(&BoolFlag::new("dry-run", [Opts::new().ubiq(true).desc("do nothing")])?)?;

    let mut greet_cmd = Command::new("greet").about("Print a greeting").run(greet);
    greet_cmd.add_flags(&[
        &StringFlag::new("name", [Opts::new().desc("who to greet").default("world")])?,
        &Int32Flag::new("count", [Opts::new().abbr("c").desc("repetitions").default(1)])?,
        &BoolFlag::new("loud", [Opts::new().desc("shout")])?,
    ])?;

    let mut serve_cmd = Command::new("serve").about("Pretend to run a server").run(serve);
    serve_cmd.add_flag(&Uint16Flag::new(
        "port",
        [Opts::new().abbr("p").desc("listen port").default(8080u16)],
    )?)?;

    let show_cmd = Command::new("show").about("Echo positional arguments").run(show);

    app.root_mut().sub_cmds([greet_cmd, serve_cmd, show_cmd]);
    Ok(app)
}

fn main() {
    let app = build().unwrap_or_else(|e| {
        eprintln!("Failed to set up:\n{e}");
        std::process::exit(1);
    });
    app.execute();
    app.shutdown();
}
