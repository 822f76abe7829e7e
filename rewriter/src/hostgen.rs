// Host-driver reference code generator.
//
// Assembles an illustrative C snippet showing how a host program would
// allocate the recorder buffers, pass them to the instrumented kernel, read
// them back, and print a coverage report from the `.dat` file. The output is
// a human-readable reference, not compiled code.
//
// Preconditions: layout comes from a completed analysis of the kernel the
//   host code targets.
// Postconditions: only the parts matching non-zero counts are emitted.
// Failure modes: none (missing config keys fall back to placeholder names).
// Side effects: none.

use std::fmt::Write;

use crate::config::UserConfig;
use crate::layout::RecorderLayout;
use crate::session::Provenance;

/// Names the generated snippet references in the user's host program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCodeOptions {
    pub kernel_function_name: String,
    pub cl_context: String,
    pub error_code_variable: String,
    pub cl_command_queue: String,
    /// Argument index of the first inserted recorder parameter, i.e. the
    /// kernel's original argument count.
    pub first_recorder_argument: u32,
}

impl HostCodeOptions {
    /// Read the host-code keys from a user config, falling back to
    /// placeholder names where a key is absent.
    pub fn from_config(config: &UserConfig) -> Self {
        let get = |key: &str, fallback: &str| {
            config.get(key).unwrap_or(fallback).to_string()
        };
        HostCodeOptions {
            kernel_function_name: get("kernel_function_name", "kernel"),
            cl_context: get("cl_context", "context"),
            error_code_variable: get("error_code_variable", "err"),
            cl_command_queue: get("cl_command_queue", "queue"),
            first_recorder_argument: config
                .get("kernel_argument_count")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        }
    }

    fn branch_array(&self) -> String {
        format!("{}_branch_coverage_recorder", self.kernel_function_name)
    }

    fn barrier_array(&self) -> String {
        format!("{}_barrier_divergence_recorder", self.kernel_function_name)
    }
}

/// Render the reference host code for one instrumented kernel.
pub fn generate_host_code(
    opts: &HostCodeOptions,
    layout: RecorderLayout,
    dat_path: &str,
    provenance: &Provenance,
) -> String {
    let mut out = String::new();
    let err = &opts.error_code_variable;
    let queue = &opts.cl_command_queue;
    let branch = opts.branch_array();
    let barrier = opts.barrier_array();
    let cov = layout.coverage_slots();
    let bar = layout.barrier_slots();

    let _ = writeln!(
        out,
        "// oclbc {} reference host code, kernel source sha256: {}",
        provenance.rewriter_version,
        provenance.source_hash_hex()
    );
    let _ = writeln!(
        out,
        "// Generated host code can be used as a guideline to initialise and manage\n\
         // the recorder buffers and print the coverage report. Use it as a reference.\n"
    );

    let _ = writeln!(out, "// Part 1: recorder array declaration");
    if layout.has_branches() {
        let _ = writeln!(out, "int {branch}[{cov}] = {{0}};");
        let _ = writeln!(
            out,
            "cl_mem d_{branch} = clCreateBuffer({}, CL_MEM_READ_WRITE, sizeof(int)*{cov}, NULL, &{err});",
            opts.cl_context
        );
        let _ = writeln!(
            out,
            "{err} = clEnqueueWriteBuffer({queue}, d_{branch}, CL_TRUE, 0, {cov}*sizeof(int), {branch}, 0, NULL, NULL);\n"
        );
    }
    if layout.has_barriers() {
        let _ = writeln!(out, "int {barrier}[{bar}] = {{0}};");
        let _ = writeln!(
            out,
            "cl_mem d_{barrier} = clCreateBuffer({}, CL_MEM_READ_WRITE, sizeof(int)*{bar}, NULL, &{err});",
            opts.cl_context
        );
        let _ = writeln!(
            out,
            "{err} = clEnqueueWriteBuffer({queue}, d_{barrier}, CL_TRUE, 0, {bar}*sizeof(int), {barrier}, 0, NULL, NULL);\n"
        );
    }

    let _ = writeln!(out, "// Part 2: set arguments on the kernel function");
    let mut arg = opts.first_recorder_argument;
    if layout.has_branches() {
        let _ = writeln!(
            out,
            "{err} = clSetKernelArg({}, {arg}, sizeof(cl_mem), &d_{branch});",
            opts.kernel_function_name
        );
        arg += 1;
    }
    if layout.has_barriers() {
        let _ = writeln!(
            out,
            "{err} = clSetKernelArg({}, {arg}, sizeof(cl_mem), &d_{barrier});",
            opts.kernel_function_name
        );
    }
    out.push('\n');

    let _ = writeln!(out, "// Part 3: read the recorders back from the device");
    if layout.has_branches() {
        let _ = writeln!(
            out,
            "{err} = clEnqueueReadBuffer({queue}, d_{branch}, CL_TRUE, 0, sizeof(int)*{cov}, {branch}, 0, NULL, NULL);"
        );
    }
    if layout.has_barriers() {
        let _ = writeln!(
            out,
            "{err} = clEnqueueReadBuffer({queue}, d_{barrier}, CL_TRUE, 0, sizeof(int)*{bar}, {barrier}, 0, NULL, NULL);"
        );
    }
    out.push('\n');

    let _ = writeln!(out, "// Part 4: print the coverage report");
    let _ = writeln!(out, "FILE *oclbc_fp;");
    let _ = writeln!(out, "char *line = NULL;");
    let _ = writeln!(out, "size_t len = 0;");
    let _ = writeln!(out, "oclbc_fp = fopen(\"{dat_path}\", \"r\");");
    let _ = writeln!(out, "if (!oclbc_fp) {{");
    let _ = writeln!(out, "  printf(\"oclbc data file not found\\n\");");
    let _ = writeln!(out, "}} else {{");
    if layout.has_branches() {
        let _ = writeln!(
            out,
            "  int oclbc_total_branches = {cov}, oclbc_covered_branches = 0;"
        );
        let _ = writeln!(out, "  printf(\"Condition coverage summary\\n\");");
        let _ = writeln!(
            out,
            "  for (int oclbc_i = 0; oclbc_i < {cov}; oclbc_i += 2) {{"
        );
        let _ = writeln!(
            out,
            "    getline(&line, &len, oclbc_fp); printf(\"%s\", line);"
        );
        let _ = writeln!(
            out,
            "    getline(&line, &len, oclbc_fp); printf(\"%s\", line);"
        );
        let _ = writeln!(
            out,
            "    getline(&line, &len, oclbc_fp); printf(\"%s\", line);"
        );
        let _ = writeln!(out, "    if ({branch}[oclbc_i]) {{");
        let _ = writeln!(
            out,
            "      printf(\"True branch covered\\n\"); oclbc_covered_branches++;"
        );
        let _ = writeln!(
            out,
            "    }} else {{ printf(\"True branch not covered\\n\"); }}"
        );
        let _ = writeln!(out, "    if ({branch}[oclbc_i + 1]) {{");
        let _ = writeln!(
            out,
            "      printf(\"False branch covered\\n\"); oclbc_covered_branches++;"
        );
        let _ = writeln!(
            out,
            "    }} else {{ printf(\"False branch not covered\\n\"); }}"
        );
        let _ = writeln!(out, "  }}");
    }
    if layout.has_barriers() {
        let _ = writeln!(
            out,
            "  int oclbc_total_barriers = {bar}, oclbc_faulty_barriers = 0;"
        );
        let _ = writeln!(
            out,
            "  for (int oclbc_i = 0; oclbc_i < {bar}; ++oclbc_i) {{"
        );
        let _ = writeln!(
            out,
            "    getline(&line, &len, oclbc_fp); printf(\"%s\", line);"
        );
        let _ = writeln!(
            out,
            "    getline(&line, &len, oclbc_fp); printf(\"%s\", line);"
        );
        let _ = writeln!(out, "    if ({barrier}[oclbc_i]) {{");
        let _ = writeln!(
            out,
            "      printf(\"This barrier has got a divergence\\n\"); ++oclbc_faulty_barriers;"
        );
        let _ = writeln!(
            out,
            "    }} else {{ printf(\"This barrier worked fine\\n\"); }}"
        );
        let _ = writeln!(out, "  }}");
    }
    if layout.has_branches() {
        let _ = writeln!(
            out,
            "  printf(\"Total branch coverage: %-4.2f\\n\", \
             (double)oclbc_covered_branches / (double)oclbc_total_branches * 100.0);"
        );
    }
    if layout.has_barriers() {
        let _ = writeln!(
            out,
            "  printf(\"Faulty barrier rate: %-4.2f\\n\", \
             (double)oclbc_faulty_barriers / (double)oclbc_total_barriers * 100.0);"
        );
    }
    let _ = writeln!(out, "}}");
    out
}
