use std::fmt::Write;
use std::path::PathBuf;
use std::{env, fs};

struct Setting {
    name: &'static str,
    ty: &'static str,
    default: u64,
}

const SETTINGS: &[Setting] = &[
    Setting {
        name: "EVENT_TIMEOUT_MS",
        ty: "u64",
        default: 5000,
    },
    Setting {
        name: "CONNECT_TIMEOUT_MS",
        ty: "u64",
        default: 10000,
    },
    Setting {
        name: "WRITE_CMD_RETRIES",
        ty: "u8",
        default: 10,
    },
    Setting {
        name: "DEFAULT_ATT_MTU",
        ty: "u16",
        default: 23,
    },
    Setting {
        name: "PREFERRED_ATT_MTU",
        ty: "u16",
        default: 247,
    },
    Setting {
        name: "VENDOR_UUID_COUNT",
        ty: "usize",
        default: 10,
    },
    Setting {
        name: "EVENT_SYNC_WAITERS",
        ty: "usize",
        default: 4,
    },
];

fn main() {
    let mut out = String::new();
    for setting in SETTINGS {
        let var = format!("TROUBLE_DRIVER_{}", setting.name);
        println!("cargo:rerun-if-env-changed={}", var);
        let value = match env::var(&var) {
            Ok(v) => v
                .parse::<u64>()
                .unwrap_or_else(|_| panic!("{} must be an unsigned integer, got {:?}", var, v)),
            Err(_) => setting.default,
        };
        writeln!(out, "pub const {}: {} = {};", setting.name, setting.ty, value).unwrap();
    }

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").unwrap());
    fs::write(out_dir.join("config.rs"), out).unwrap();
    println!("cargo:rerun-if-changed=build.rs");
}
