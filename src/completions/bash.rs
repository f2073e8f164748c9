const DYNAMIC_COMPLETIONS: &str = r#"

__pipewright_dynamic_tasks() {
    local prefix="${1:-}"
    local file=""
    local idx=1
    while [[ $idx -lt ${#COMP_WORDS[@]} ]]; do
        local token="${COMP_WORDS[$idx]}"
        case "$token" in
            --file|-f)
                ((idx++))
                file="${COMP_WORDS[$idx]}"
                ;;
            --)
                break
                ;;
        esac
        ((idx++))
    done
    local cmd=(pipewright)
    if [[ -n "$file" ]]; then
        cmd+=(--file "$file")
    fi
    cmd+=(complete-tasks "$prefix")
    "${cmd[@]}" 2>/dev/null
}

_pipewright() {
    local cur="${COMP_WORDS[COMP_CWORD]}"
    local first_cmd_idx=0
    local idx=1
    local expect_value=0
    while [[ $idx -lt ${#COMP_WORDS[@]} ]]; do
        local token="${COMP_WORDS[$idx]}"
        if [[ $expect_value -eq 1 ]]; then
            expect_value=0
            ((idx++))
            continue
        fi
        case "$token" in
            -f|--file|-e|--env)
                expect_value=1
                ;;
            -*)
                ;;
            *)
                first_cmd_idx=$idx
                break
                ;;
        esac
        ((idx++))
    done

    local complete_names=0
    if [[ $first_cmd_idx -eq 0 || ${COMP_CWORD} -eq $first_cmd_idx ]]; then
        case "$cur" in
            -*|list|run|check|completions|"")
                ;;
            *)
                complete_names=1
                ;;
        esac
    else
        case "${COMP_WORDS[$first_cmd_idx]}" in
            list|check|completions|help)
                ;;
            *)
                [[ "$cur" != -* ]] && complete_names=1
                ;;
        esac
    fi

    if [[ $complete_names -eq 1 ]]; then
        local candidates="$(__pipewright_dynamic_tasks "$cur")"
        if [[ -n "$candidates" ]]; then
            COMPREPLY=( $(compgen -W "$candidates" -- "$cur") )
            return 0
        fi
    fi
    __pipewright_base "$@"
}
"#;

const REREGISTER: &str = r#"
if [[ "${BASH_VERSINFO[0]}" -eq 4 && "${BASH_VERSINFO[1]}" -ge 4 || "${BASH_VERSINFO[0]}" -gt 4 ]]; then
    complete -F _pipewright -o nosort -o bashdefault -o default pipewright
else
    complete -F _pipewright -o bashdefault -o default pipewright
fi
"#;

pub fn patch(mut script: String) -> String {
    if script.contains("_pipewright()") {
        script = script.replacen("_pipewright()", "__pipewright_base()", 1);
        script.push_str(DYNAMIC_COMPLETIONS);
        script.push_str(REREGISTER);
    }
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_renames_generated_function_and_appends_dynamic_part() {
        let generated = "_pipewright() {\n    :\n}\ncomplete -F _pipewright pipewright\n".to_string();
        let patched = patch(generated);
        assert!(patched.starts_with("__pipewright_base() {"));
        assert!(patched.contains("complete-tasks \"$prefix\""));
        assert!(patched.contains("complete -F _pipewright -o nosort"));
    }

    #[test]
    fn patch_leaves_unrecognized_scripts_alone() {
        let script = "# nothing to patch\n".to_string();
        assert_eq!(patch(script.clone()), script);
    }
}
