// build.rs
// Compiles GLSL under resources/shaders to SPIR-V in target/shaders

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_EXTENSIONS: &[&str] = &["vert", "frag"];

fn main() {
    println!("cargo:rerun-if-changed=../../resources/shaders");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    if env::var_os("SKIP_SHADERS").is_some() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Ok(vulkan_sdk) = env::var("VULKAN_SDK") else {
        eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
        return;
    };

    let glslc = if cfg!(target_os = "windows") {
        PathBuf::from(&vulkan_sdk).join("Bin").join("glslc.exe")
    } else {
        PathBuf::from(&vulkan_sdk).join("bin").join("glslc")
    };

    if !glslc.exists() {
        panic!("glslc not found at {}", glslc.display());
    }

    let shader_dir = Path::new("../../resources/shaders");
    let target_dir = Path::new("../../target/shaders");

    if let Err(e) = std::fs::create_dir_all(target_dir) {
        eprintln!("warning: Failed to create {}: {e}", target_dir.display());
        return;
    }

    let Ok(entries) = std::fs::read_dir(shader_dir) else {
        eprintln!("info: No shader directory at {}", shader_dir.display());
        return;
    };

    let mut compiled = 0;
    for path in entries.filter_map(Result::ok).map(|entry| entry.path()) {
        let is_shader = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SHADER_EXTENSIONS.contains(&ext));
        let Some(stem) = path.file_stem().filter(|_| is_shader) else {
            continue;
        };

        let out_file = target_dir.join(stem).with_extension("spv");
        if is_up_to_date(&path, &out_file) {
            continue;
        }

        let status = Command::new(&glslc).arg(&path).arg("-o").arg(&out_file).status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {} -> {}", path.display(), out_file.display());
                compiled += 1;
            }
            Ok(s) => panic!("glslc failed for {} with {s}", path.display()),
            Err(e) => panic!("failed to run glslc for {}: {e}", path.display()),
        }
    }

    eprintln!("info: Compiled {compiled} shader(s)");
}

fn is_up_to_date(source: &Path, output: &Path) -> bool {
    let modified = |path: &Path| std::fs::metadata(path).and_then(|meta| meta.modified()).ok();
    match (modified(source), modified(output)) {
        (Some(src), Some(dst)) => dst >= src,
        _ => false,
    }
}
